//! Minimal HTML for the upload form and the result view.

pub const INDEX_PAGE: &str = r#"<!doctype html>
<html>
<head><title>Image Colorization</title></head>
<body>
  <h1>Colorize a photo</h1>
  <form method="post" action="/" enctype="multipart/form-data">
    <input type="file" name="file" accept=".png,.jpg,.jpeg">
    <input type="submit" value="Upload">
  </form>
</body>
</html>
"#;

pub fn result_page(filename: &str) -> String {
    let name = escape(filename);
    format!(
        r#"<!doctype html>
<html>
<head><title>Colorized: {name}</title></head>
<body>
  <h1>Colorized image</h1>
  <img src="/outputs/{name}" alt="{name}" style="max-width: 100%">
  <p><a href="/outputs/{name}">Download</a> &middot; <a href="/">Colorize another</a></p>
</body>
</html>
"#
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
