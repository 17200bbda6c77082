use crate::{page::Page, routes::scanner::Upload, scanner::ScanReport};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt::Write;

const STYLE: &str = r#"
body { margin: 0; font-family: "Source Sans Pro", Helvetica, Arial, sans-serif; color: #262730; display: flex; }
aside { width: 260px; min-height: 100vh; background: #f0f2f6; padding: 24px; box-sizing: border-box; }
aside .brand { font-size: 28px; font-weight: 700; letter-spacing: 4px; color: #7b2cbf; margin-bottom: 24px; }
main { flex: 1; max-width: 760px; padding: 48px 64px; }
figure { margin: 16px 0; text-align: center; }
figure img { max-width: 100%; }
figcaption { color: #808495; font-size: 14px; }
.centered-text { text-align: center; }
.error { background: #ffe9e9; color: #7d1a1a; padding: 12px 16px; border-radius: 4px; }
.notice { background: #fff8e1; padding: 12px 16px; border-radius: 4px; }
table { border-collapse: collapse; margin: 16px auto; }
td, th { padding: 4px 12px; border-bottom: 1px solid #e6e6e6; text-align: left; }
.swatch { display: inline-block; width: 12px; height: 12px; margin-right: 6px; border: 1px solid #999; }
"#;

const HOME_DESCRIPTION: &str = "This website is designed to utilize digital pathology technology to \
increase the accuracy of cervical cancer detection and diagnosis by utilizing Artificial \
Intelligence. This website is also the latest innovation for a better Indonesia in terms of \
health and technology because it can help pathologists speed up and increase precision/accuracy \
in detecting cervical cancer cells.";

/// What the scanner page shows below the upload form.
pub enum ScannerView<'a> {
    Empty,
    Error(String),
    Report {
        upload: &'a Upload,
        report: &'a ScanReport,
    },
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

fn sidebar(current: Option<Page>) -> String {
    let mut options = String::new();
    for page in Page::ALL {
        let selected = if Some(page) == current { " selected" } else { "" };
        let _ = write!(
            options,
            r#"<option value="{}"{}>{}</option>"#,
            page.slug(),
            selected,
            page.title()
        );
    }

    format!(
        r#"<aside>
<div class="brand">VIUME</div>
<form method="get" action="/">
<select name="page" onchange="this.form.submit()">{}</select>
<noscript><button type="submit">Go</button></noscript>
</form>
</aside>"#,
        options
    )
}

fn layout(current: Option<Page>, title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{} · VIUME</title>
<style>{}</style>
</head>
<body>
{}
<main>
{}
</main>
</body>
</html>"#,
        escape(title),
        STYLE,
        sidebar(current),
        content
    )
}

pub fn home() -> String {
    let content = format!(
        r#"<h3>WELCOME TO VIUME</h3>
<h1>DIGITAL PATHOLOGY PLATFORM FOR CERVICAL CANCER DETECTION</h1>
<p>{}</p>"#,
        HOME_DESCRIPTION
    );
    layout(Some(Page::Home), Page::Home.title(), &content)
}

pub fn contact() -> String {
    let content = r#"<h1>Contact Us</h1>
<h2>More information about us!</h2>
<p>Instagram: <a href="https://www.instagram.com/viume_official/">@viume_official</a></p>
<p>Phone: (+62)888-2222-4444</p>
<p>E-mail: <a href="mailto:info.viume@gmail.com">info.viume@gmail.com</a></p>"#;
    layout(Some(Page::Contact), "Contact Us", content)
}

pub fn not_found(slug: &str) -> String {
    let content = format!(
        r#"<h1>Page not found</h1>
<p class="error">There is no page called "{}". Pick one from the menu.</p>"#,
        escape(slug)
    );
    layout(None, "Page not found", &content)
}

const UPLOAD_FORM: &str = r#"<form method="post" action="/scanner" enctype="multipart/form-data">
<label for="file">Choose an image here.</label><br>
<input type="file" id="file" name="file" accept=".jpg,.jpeg,.png" required>
<button type="submit">Scan</button>
</form>"#;

pub fn scanner(view: &ScannerView<'_>) -> String {
    let mut content = String::from("<h1>Scanner</h1>\n");
    content.push_str(UPLOAD_FORM);

    match view {
        ScannerView::Empty => {}
        ScannerView::Error(message) => {
            let _ = write!(content, r#"<p class="error">{}</p>"#, escape(message));
        }
        ScannerView::Report { upload, report } => {
            content.push_str(&report_section(upload, report));
        }
    }

    layout(Some(Page::Scanner), Page::Scanner.title(), &content)
}

fn report_section(upload: &Upload, report: &ScanReport) -> String {
    let mut section = format!(
        r#"
<figure><img src="{}" alt="{}"><figcaption>Uploaded Image</figcaption></figure>
<p>Classifying...</p>
<h3 class="centered-text">Cervical cancer cell screening results by VIUME</h3>
"#,
        data_uri(upload.content_type, &upload.bytes),
        escape(&upload.file_name)
    );

    match (&report.percentages, &report.chart_png) {
        (Some(percentages), Some(chart_png)) => {
            let _ = write!(
                section,
                r#"<figure><img src="{}" alt="Detection percentage per class"></figure>
<table>
<tr><th>Class</th><th>Detections</th><th>Percentage</th></tr>
"#,
                data_uri("image/png", chart_png)
            );
            for row in percentages.rows() {
                let _ = writeln!(
                    section,
                    r#"<tr><td><span class="swatch" style="background:{}"></span>{}</td><td>{}</td><td>{:.2}%</td></tr>"#,
                    row.color.to_hex(),
                    escape(&row.display_name),
                    row.count,
                    row.percentage
                );
            }
            section.push_str("</table>\n");
        }
        _ => {
            section.push_str(
                r#"<p class="notice">No detections found in this image.</p>
"#,
            );
        }
    }

    let _ = write!(
        section,
        r#"<figure><img src="{}" alt="Predicted image"><figcaption>Predicted Image.</figcaption></figure>"#,
        data_uri("image/png", &report.image_png)
    );

    section
}
