//! HTML fragments for the result panel and the history grid. Every function
//! here is a pure function of state; the page swaps the output in as-is.

use chrono::{Local, TimeZone};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::history_store::HistoryItem;
use crate::session::{SelectedImage, SessionState};

pub fn render_result_panel(state: &SessionState) -> String {
    let Some(image) = state.image() else {
        return String::new();
    };

    let body = match state {
        SessionState::Idle => return String::new(),
        SessionState::Ready(_) => render_ready_card(),
        SessionState::Generating { .. } => render_generating_card(),
        SessionState::Succeeded { prompt, .. } => render_prompt_card(prompt),
        SessionState::Failed { error, .. } => {
            format!("{}{}", render_ready_card(), render_error_box(error))
        }
    };

    format!(
        "<div class=\"preview-grid\">{}<div class=\"result-pane\">{}</div></div>",
        render_preview(image),
        body
    )
}

pub fn render_history_grid(items: &[HistoryItem], capacity: usize) -> String {
    if items.is_empty() {
        return String::new();
    }

    let cards: Vec<String> = items.iter().map(render_history_card).collect();
    format!(
        "<div class=\"history-head\"><div><h2>Recent Generations</h2><p class=\"muted\">Your last {} generated prompts</p></div><button class=\"link-btn danger\" data-action=\"clear-history\">Clear History</button></div><div class=\"history-grid\">{}</div>",
        capacity,
        cards.join("")
    )
}

pub fn format_history_date(timestamp_ms: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn render_preview(image: &SelectedImage) -> String {
    format!(
        "<div class=\"preview-pane\"><div class=\"preview-frame\"><img class=\"preview-image\" src=\"{}\" alt=\"Preview\" /><span class=\"image-badge\">{}</span></div><button class=\"link-btn danger\" data-action=\"reset\">Discard Image</button></div>",
        image_src(&image.data_url),
        encode_text(&image.name)
    )
}

fn render_ready_card() -> String {
    concat!(
        "<section class=\"card\">",
        "<h3>Ready to transform?</h3>",
        "<p class=\"muted\">Click the button below and the vision model will analyze every pixel to generate a high-fidelity prompt for you.</p>",
        "<button class=\"primary-btn\" data-action=\"generate\">&#10024; Generate Prompt</button>",
        "</section>"
    )
    .to_string()
}

fn render_generating_card() -> String {
    concat!(
        "<section class=\"card generating\">",
        "<div class=\"spinner\" aria-hidden=\"true\"></div>",
        "<h4>Analyzing Image...</h4>",
        "<p class=\"muted\"><em>Deconstructing lighting and composition...</em></p>",
        "</section>"
    )
    .to_string()
}

fn render_prompt_card(prompt: &str) -> String {
    format!(
        "<section class=\"card\"><div class=\"card-title\"><h3>Generated Prompt</h3><button class=\"icon-btn\" data-action=\"copy\" data-prompt=\"{}\" title=\"Copy to clipboard\">Copy</button></div><blockquote class=\"prompt-text\">&quot;{}&quot;</blockquote><div class=\"stack\"><button class=\"outline-btn\" data-action=\"generate\">Regenerate</button><button class=\"dark-btn\" data-action=\"reset\">New Image</button></div></section>",
        encode_double_quoted_attribute(prompt),
        encode_text(prompt)
    )
}

fn render_error_box(error: &str) -> String {
    format!(
        "<div class=\"error-box\" role=\"alert\"><p class=\"error-title\">API Error</p><p class=\"error-message\">{}</p></div>",
        encode_text(error)
    )
}

fn render_history_card(item: &HistoryItem) -> String {
    format!(
        "<article class=\"history-card\" data-history-id=\"{}\"><div class=\"thumb\"><img src=\"{}\" alt=\"{}\" loading=\"lazy\" /></div><div class=\"card-body\"><div class=\"card-meta\"><span class=\"card-date\">{}</span><button class=\"icon-btn\" data-action=\"copy\" data-prompt=\"{}\" title=\"Copy prompt\">Copy</button></div><p class=\"card-prompt\">{}</p></div></article>",
        encode_double_quoted_attribute(&item.id),
        image_src(&item.image_data),
        encode_double_quoted_attribute(&item.image_name),
        encode_text(&format_history_date(item.timestamp)),
        encode_double_quoted_attribute(&item.prompt),
        encode_text(&item.prompt)
    )
}

/// Only inline images are rendered; anything else in a tampered record is dropped.
fn image_src(data_url: &str) -> String {
    if data_url.starts_with("data:image/") {
        encode_double_quoted_attribute(data_url).to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{format_history_date, render_history_grid, render_result_panel};
    use crate::history_store::HistoryItem;
    use crate::session::{SelectedImage, SessionState};

    fn image() -> SelectedImage {
        SelectedImage {
            name: "cat <1>.png".to_string(),
            data_url: "data:image/png;base64,QUJD".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn idle_renders_nothing() {
        assert_eq!(render_result_panel(&SessionState::Idle), "");
    }

    #[test]
    fn ready_offers_generate_and_escapes_name() {
        let html = render_result_panel(&SessionState::Ready(image()));
        assert!(html.contains("Ready to transform?"));
        assert!(html.contains("data-action=\"generate\""));
        assert!(html.contains("cat &lt;1&gt;.png"));
        assert!(html.contains("src=\"data:image/png;base64,QUJD\""));
    }

    #[test]
    fn generating_hides_generate_button() {
        let html = render_result_panel(&SessionState::Generating {
            image: image(),
            request_id: 1,
        });
        assert!(html.contains("Analyzing Image..."));
        assert!(!html.contains("data-action=\"generate\""));
    }

    #[test]
    fn succeeded_escapes_prompt_text_and_attribute() {
        let html = render_result_panel(&SessionState::Succeeded {
            image: image(),
            prompt: "a \"cat\" <script>".to_string(),
        });
        assert!(html.contains("Regenerate"));
        assert!(html.contains("&quot;a \"cat\" &lt;script&gt;&quot;"));
        assert!(html.contains("data-prompt=\"a &quot;cat&quot; <script>\"")
            || html.contains("data-prompt=\"a &quot;cat&quot; &lt;script&gt;\""));
    }

    #[test]
    fn failed_shows_message_verbatim_and_allows_retry() {
        let html = render_result_panel(&SessionState::Failed {
            image: image(),
            error: "Authentication error: The provided API key is invalid or has expired."
                .to_string(),
        });
        assert!(html.contains("API Error"));
        assert!(html.contains("The provided API key is invalid or has expired."));
        assert!(html.contains("data-action=\"generate\""));
    }

    #[test]
    fn empty_history_renders_nothing() {
        assert_eq!(render_history_grid(&[], 20), "");
    }

    #[test]
    fn history_grid_lists_items_in_order_and_drops_unsafe_sources() {
        let mut second = HistoryItem::new("b.png", "javascript:alert(1)", "second");
        second.timestamp = 1_700_000_000_000;
        let first = HistoryItem::new("a.png", "data:image/png;base64,QUJD", "first");

        let html = render_history_grid(&[first, second], 20);
        assert!(html.contains("Your last 20 generated prompts"));
        assert!(html.contains("data-action=\"clear-history\""));
        let first_pos = html.find(">first<").expect("first card");
        let second_pos = html.find(">second<").expect("second card");
        assert!(first_pos < second_pos);
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn formats_dates_and_tolerates_out_of_range() {
        assert_eq!(format_history_date(1_700_000_000_000).len(), 10);
        assert_eq!(format_history_date(i64::MAX), "");
    }
}
