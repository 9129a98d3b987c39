//! Server-rendered HTML templates
//!
//! Plain `format!`-based rendering, no template engine. All user-supplied
//! and upstream-supplied text goes through [`escape_html`] before it is
//! embedded in markup.

use narrowfin_core::api::MediaItem;
use urlencoding::encode;

/// Escapes text for embedding in HTML content or attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Base HTML shell with shared styles.
fn base_template(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title} - Narrowfin</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
               background: #101418; color: #e8e8e8; line-height: 1.6; }}
        nav {{ background: #181e24; border-bottom: 1px solid #2a333c; padding: 0 20px; }}
        .nav-container {{ max-width: 960px; margin: 0 auto; display: flex; align-items: center; height: 56px; gap: 24px; }}
        .logo {{ font-size: 20px; font-weight: bold; color: #5ab0f2; text-decoration: none; }}
        .nav-container a {{ color: #ccc; text-decoration: none; }}
        .nav-container a:hover {{ color: #5ab0f2; }}
        .nav-search {{ margin-left: auto; display: flex; gap: 8px; }}
        .nav-search input {{ padding: 6px 10px; border: 1px solid #2a333c; background: #232b33;
                             color: #fff; border-radius: 4px; }}
        .container {{ max-width: 960px; margin: 0 auto; padding: 24px 20px; }}
        h1 {{ font-size: 26px; margin-bottom: 18px; }}
        ul.media {{ list-style: none; }}
        ul.media li {{ padding: 10px 12px; border-bottom: 1px solid #222a32; display: flex; gap: 12px; align-items: baseline; }}
        ul.media li:hover {{ background: #181e24; }}
        .item-name {{ flex: 1; }}
        .item-kind {{ color: #889; font-size: 13px; }}
        .btn {{ padding: 5px 12px; background: #2a6fb0; color: #fff; border-radius: 4px;
                text-decoration: none; font-size: 14px; }}
        .btn:hover {{ background: #3a84c8; }}
        .pager {{ margin-top: 20px; display: flex; gap: 12px; }}
        .error {{ color: #ff8080; margin-bottom: 12px; }}
        form.login {{ max-width: 320px; margin: 60px auto; display: flex; flex-direction: column; gap: 12px; }}
        form.login input {{ padding: 10px; border: 1px solid #2a333c; background: #232b33;
                            color: #fff; border-radius: 4px; }}
        form.login button {{ padding: 10px; background: #2a6fb0; color: #fff; border: none;
                             border-radius: 4px; cursor: pointer; }}
        video, audio {{ width: 100%; max-height: 70vh; background: #000; margin-bottom: 16px; }}
    </style>
</head>
<body>
{content}
</body>
</html>"#
    )
}

/// Navigation bar shown on authenticated pages.
fn nav_bar() -> &'static str {
    r#"<nav>
  <div class="nav-container">
    <a class="logo" href="/libraries">Narrowfin</a>
    <a href="/libraries">Libraries</a>
    <form class="nav-search" action="/search" method="get">
      <input type="text" name="query" placeholder="Search..." required>
    </form>
  </div>
</nav>"#
}

/// Login form, with an optional error line after a failed attempt.
pub fn login_page(error: Option<&str>) -> String {
    let error_line = error
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();

    let content = format!(
        r#"<div class="container">
  <form class="login" action="/" method="post">
    <h1>Narrowfin</h1>
    {error_line}
    <input type="text" name="username" placeholder="Username" required>
    <input type="password" name="password" placeholder="Password" required>
    <button type="submit">Sign in</button>
  </form>
</div>"#
    );
    base_template("Login", &content)
}

/// Library views list.
pub fn libraries_page(views: &[MediaItem]) -> String {
    let rows: String = views
        .iter()
        .map(|view| {
            let library_type = view
                .collection_type
                .as_deref()
                .map(|kind| format!("?library_type={}", encode(kind)))
                .unwrap_or_default();
            format!(
                r#"    <li><a class="item-name" href="/items/{id}{library_type}">{name}</a><span class="item-kind">{kind}</span></li>
"#,
                id = encode(&view.id),
                name = escape_html(&view.name),
                kind = escape_html(view.collection_type.as_deref().unwrap_or("")),
            )
        })
        .collect();

    let content = format!(
        r#"{nav}
<div class="container">
  <h1>Libraries</h1>
  <ul class="media">
{rows}  </ul>
</div>"#,
        nav = nav_bar(),
    );
    base_template("Libraries", &content)
}

/// Rendering inputs shared by folder listings and search results.
pub struct ItemListView<'a> {
    pub heading: String,
    pub items: &'a [MediaItem],
    /// Href prefix for prev/next links, ending in `?` or `&` so a `page=`
    /// pair can be appended directly
    pub pager_base: String,
    pub page: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Item listing shared by `/items/{parent_id}` and `/search`.
pub fn item_list_page(view: &ItemListView<'_>) -> String {
    let rows: String = view.items.iter().map(render_item_row).collect();

    let mut pager = String::new();
    if view.has_prev {
        pager.push_str(&format!(
            r#"<a class="btn" href="{}page={}">&laquo; Prev</a>"#,
            view.pager_base,
            view.page - 1
        ));
    }
    if view.has_next {
        pager.push_str(&format!(
            r#"<a class="btn" href="{}page={}">Next &raquo;</a>"#,
            view.pager_base,
            view.page + 1
        ));
    }

    let content = format!(
        r#"{nav}
<div class="container">
  <h1>{heading}</h1>
  <ul class="media">
{rows}  </ul>
  <div class="pager">{pager}</div>
</div>"#,
        nav = nav_bar(),
        heading = escape_html(&view.heading),
    );
    base_template(&view.heading, &content)
}

fn render_item_row(item: &MediaItem) -> String {
    let numbering = match (item.parent_index_number, item.index_number) {
        (Some(season), Some(episode)) => format!("S{season:02}E{episode:02} "),
        (None, Some(episode)) => format!("{episode}. "),
        _ => String::new(),
    };

    let browsable = matches!(
        item.item_type.as_str(),
        "Series" | "Season" | "Channel" | "Folder" | "CollectionFolder" | "BoxSet"
    );

    let mut actions = String::new();
    if browsable {
        actions.push_str(&format!(
            r#"<a class="btn" href="/items/{}">Browse</a>"#,
            encode(&item.id)
        ));
    }
    if item.is_playable() {
        actions.push_str(&format!(
            r#"<a class="btn" href="/play/{}/{}">Play</a>"#,
            encode(&item.id),
            encode(&item.item_type)
        ));
    }

    format!(
        r#"    <li><span class="item-name">{numbering}{name}</span><span class="item-kind">{kind}</span>{actions}</li>
"#,
        name = escape_html(&item.name),
        kind = escape_html(&item.item_type),
    )
}

/// Player page offering both delivery modes for one item.
pub fn player_page(item_id: &str, item_type: &str) -> String {
    let direct_url = format!(
        "/proxy_stream/{}/direct/{}",
        encode(item_id),
        encode(item_type)
    );
    let transcode_url = format!(
        "/proxy_stream/{}/transcode/{}",
        encode(item_id),
        encode(item_type)
    );

    let is_audio = item_type.to_ascii_lowercase().contains("audio");
    let element = if is_audio { "audio" } else { "video" };

    let content = format!(
        r#"{nav}
<div class="container">
  <h1>Now playing</h1>
  <{element} controls autoplay src="{direct_url}"></{element}>
  <div class="pager">
    <a class="btn" href="{direct_url}">Direct stream</a>
    <a class="btn" href="{transcode_url}">Transcoded stream</a>
  </div>
</div>"#,
        nav = nav_bar(),
    );
    base_template("Player", &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"a" & 'b'</b>"#),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_login_page_renders_error() {
        let page = login_page(Some("Invalid login."));
        assert!(page.contains("Invalid login."));
        assert!(page.contains(r#"name="username""#));
    }

    #[test]
    fn test_item_names_are_escaped() {
        let items = vec![MediaItem {
            id: "x".to_string(),
            name: "<script>alert(1)</script>".to_string(),
            item_type: "Movie".to_string(),
            ..MediaItem::default()
        }];
        let view = ItemListView {
            heading: "Items".to_string(),
            items: &items,
            pager_base: "/items/x?".to_string(),
            page: 0,
            has_prev: false,
            has_next: false,
        };
        let page = item_list_page(&view);
        assert!(!page.contains("<script>alert"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_pager_links_follow_page_state() {
        let view = ItemListView {
            heading: "Items".to_string(),
            items: &[],
            pager_base: "/search?query=abc&".to_string(),
            page: 2,
            has_prev: true,
            has_next: true,
        };
        let page = item_list_page(&view);
        assert!(page.contains("/search?query=abc&page=1"));
        assert!(page.contains("/search?query=abc&page=3"));
    }

    #[test]
    fn test_player_page_offers_both_modes() {
        let page = player_page("item1", "Movie");
        assert!(page.contains("/proxy_stream/item1/direct/Movie"));
        assert!(page.contains("/proxy_stream/item1/transcode/Movie"));
        assert!(page.contains("<video"));

        let audio = player_page("item2", "Audio");
        assert!(audio.contains("<audio"));
    }
}
