//! HTML listing page.
//!
//! [`ListingTemplate::render`] turns a bucket listing into a standalone
//! HTML document: a table of objects plus an upload form whose script asks
//! `/upload-url` for a presigned URL and `PUT`s the file straight to
//! storage.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quick_xml::escape::escape;
use std::fmt::{self, Write};

use crate::storage::backend::ObjectSummary;

/// Characters left unencoded in download links: RFC 3986 unreserved plus `/`.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Timestamp layout of the "Last Modified" column.
pub const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Percent-encode an object key for use in a query parameter.
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

/// The download link for `key`.
pub fn download_href(key: &str) -> String {
    format!("/download?file={}", encode_key(key))
}

/// Renders the listing page.
#[derive(Debug, Clone)]
pub struct ListingTemplate {
    title: String,
}

impl Default for ListingTemplate {
    fn default() -> Self {
        Self::new("S3 File Portal")
    }
}

impl ListingTemplate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Render the full document, one table row per object in `objects`
    /// order.
    pub fn render(&self, objects: &[ObjectSummary]) -> Result<String, fmt::Error> {
        let title = escape(&self.title);
        let mut html = String::with_capacity(8 * 1024 + objects.len() * 256);

        write!(
            html,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLESHEET}</style>
</head>
<body>
    <div class="container">
        <h1>{title}</h1>
        <h2>File List</h2>
        <table>
            <thead>
                <tr>
                    <th>ID</th>
                    <th>File Name</th>
                    <th>Size (Bytes)</th>
                    <th>Last Modified</th>
                    <th>Download</th>
                </tr>
            </thead>
            <tbody>
"#
        )?;

        if objects.is_empty() {
            html.push_str(
                "                <tr><td colspan=\"5\" style=\"text-align:center;\">No files in bucket.</td></tr>\n",
            );
        }
        for (idx, object) in objects.iter().enumerate() {
            write_row(&mut html, idx + 1, object)?;
        }

        write!(
            html,
            r#"            </tbody>
        </table>
        <div class="upload-form">
            <h2>Upload a file</h2>
            <form id="upload-form">
                <input type="file" id="file-input" required />
                <button type="submit">Upload</button>
            </form>
            <p id="upload-status"></p>
        </div>
    </div>
    <script>{UPLOAD_SCRIPT}</script>
</body>
</html>
"#
        )?;

        Ok(html)
    }
}

fn write_row(html: &mut String, index: usize, object: &ObjectSummary) -> fmt::Result {
    let key = escape(&object.key);
    let href = download_href(&object.key);
    let download = escape(&href);
    write!(
        html,
        r#"                <tr>
                    <td>{index}</td>
                    <td><a href="/{key}">{key}</a></td>
                    <td>{size}</td>
                    <td>{modified}</td>
                    <td><a class="download-btn" href="{download}">Download</a></td>
                </tr>
"#,
        size = object.size,
        modified = object.last_modified.format(LAST_MODIFIED_FORMAT),
    )
}

const STYLESHEET: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; margin: 0; padding: 2rem; background-color: #f4f7f9; color: #333; }
        .container { max-width: 960px; margin: 0 auto; background: #fff; padding: 2rem; border-radius: 8px; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1); }
        h1, h2 { color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 0.5rem; }
        table { width: 100%; border-collapse: collapse; margin-top: 1.5rem; }
        th, td { padding: 0.75rem; text-align: left; border-bottom: 1px solid #ddd; }
        th { background-color: #ecf0f1; }
        tr:hover { background-color: #f9f9f9; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .download-btn { padding: 0.4rem 1rem; background-color: #27ae60; color: #fff; border-radius: 4px; font-size: 0.95rem; }
        .download-btn:hover { background-color: #219150; }
        .upload-form { margin-top: 2rem; padding: 1.5rem; border: 1px dashed #ccc; border-radius: 8px; background-color: #fafafa; }
        .upload-form input[type="file"] { display: block; margin-bottom: 1rem; }
        .upload-form button { padding: 0.5rem 1rem; background-color: #3498db; color: #fff; border: none; border-radius: 4px; cursor: pointer; font-size: 1rem; }
        .upload-form button:hover { background-color: #2980b9; }
        #upload-status { margin-top: 1rem; font-weight: bold; }
    "#;

// The signed URL covers the content type, so the PUT must send the same
// value that was requested from /upload-url.
const UPLOAD_SCRIPT: &str = r#"
        document.getElementById('upload-form').addEventListener('submit', async (event) => {
            event.preventDefault();
            const file = document.getElementById('file-input').files[0];
            const statusElement = document.getElementById('upload-status');
            if (!file) {
                statusElement.textContent = 'Please select a file to upload.';
                return;
            }
            const contentType = file.type || 'application/octet-stream';
            statusElement.textContent = 'Getting upload URL...';
            try {
                const res = await fetch(`/upload-url?filename=${encodeURIComponent(file.name)}&contentType=${encodeURIComponent(contentType)}`);
                if (!res.ok) throw new Error(`Failed to get upload URL: ${res.statusText}`);
                const { url } = await res.json();
                statusElement.textContent = 'Uploading...';
                const uploadRes = await fetch(url, {
                    method: 'PUT',
                    body: file,
                    headers: { 'Content-Type': contentType }
                });
                if (!uploadRes.ok) throw new Error(`Upload failed: ${uploadRes.statusText}`);
                statusElement.textContent = 'Upload successful! Page will reload shortly.';
                setTimeout(() => location.reload(), 2000);
            } catch (error) {
                console.error('Error:', error);
                statusElement.textContent = `An error occurred: ${error.message}`;
            }
        });
    "#;
