//! Progress page rendering

use crate::pipeline::progress::ProgressRecord;

/// Render the auto-refreshing progress page. `None` renders a loading state.
pub fn render_progress_page(record: Option<&ProgressRecord>, refresh_secs: u64) -> String {
    let (percent, text) = match record {
        Some(record) if record.total_steps > 0 => (
            record.percent(),
            format!(
                "Step {} of {}: {}",
                record.step_nr,
                record.total_steps,
                escape_html(&record.status_text)
            ),
        ),
        _ => (0, "Loading...".to_string()),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>Installing... {percent}%</title>
<style>
body {{ font-family: sans-serif; background: #f4f5f7; color: #222; margin: 0; }}
main {{ max-width: 40em; margin: 15vh auto; padding: 0 1em; text-align: center; }}
.bar {{ background: #ddd; border-radius: 4px; height: 1.5em; overflow: hidden; }}
.fill {{ background: #2b7de9; height: 100%; width: {percent}%; }}
</style>
</head>
<body>
<main>
<h1>The application is being installed</h1>
<p>This page refreshes automatically.</p>
<div class="bar"><div class="fill"></div></div>
<p><strong>{percent}%</strong></p>
<p>{text}</p>
</main>
</body>
</html>
"#,
        refresh = refresh_secs,
        percent = percent,
        text = text,
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
