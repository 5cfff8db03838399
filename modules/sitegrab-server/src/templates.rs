/// Render the submission form.
pub fn render_index() -> String {
    let content = r#"<div class="container">
    <h2>Download a website</h2>
    <p class="lead">Enter the address of a website. We'll mirror it for offline viewing, pack it into a zip file and send you a download link.</p>
    <form method="post" action="/download" class="card">
        <label for="url">Website URL</label>
        <input type="url" id="url" name="url" placeholder="https://example.com" required autofocus>
        <button type="submit" class="action-btn">Download</button>
        <p class="hint">Large sites can take several minutes.</p>
    </form>
</div>"#;

    build_page("Download a website", content)
}

/// Render an error page with a heading and an explanation.
pub fn render_error(title: &str, message: &str) -> String {
    let content = format!(
        r#"<div class="container">
    <div class="card error">
        <h2>{title}</h2>
        <p>{message}</p>
        <a href="/" class="action-btn">Try again</a>
    </div>
</div>"#,
        title = html_escape(title),
        message = html_escape(message),
    );

    build_page(title, &content)
}

pub fn render_not_found() -> String {
    render_error(
        "Page not found!",
        "We couldn't find the page you were looking for.",
    )
}

fn build_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} — Sitegrab</title>
<style>
*{{margin:0;padding:0;box-sizing:border-box;}}
body{{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;color:#1a1a1a;background:#fafafa;}}
.header{{background:#1a1a1a;color:#fff;padding:12px 24px;}}
.header h1{{font-size:18px;font-weight:600;}}
.header a{{color:#fff;text-decoration:none;}}
.container{{max-width:640px;margin:0 auto;padding:32px 24px;}}
.container h2{{margin-bottom:12px;}}
.lead{{color:#555;font-size:15px;margin-bottom:20px;}}
.card{{background:#fff;border:1px solid #e0e0e0;border-radius:8px;padding:20px;}}
.card.error{{border-color:#f5c2c7;}}
.card.error h2{{color:#c62828;}}
.card.error p{{color:#555;margin-bottom:16px;}}
label{{display:block;font-size:13px;color:#666;margin-bottom:6px;}}
input[type=url]{{width:100%;padding:10px;border:1px solid #ccc;border-radius:4px;font-size:15px;margin-bottom:12px;}}
.action-btn{{display:inline-block;padding:8px 18px;background:#0066cc;color:#fff;border:none;border-radius:4px;text-decoration:none;font-size:14px;font-weight:500;cursor:pointer;}}
.action-btn:hover{{background:#004499;}}
.hint{{font-size:12px;color:#888;margin-top:10px;}}
</style>
</head>
<body>
<div class="header"><h1><a href="/">Sitegrab</a></h1></div>
{content}
</body>
</html>"#,
        title = html_escape(title),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
