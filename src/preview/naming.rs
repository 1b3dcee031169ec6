//! Derived-artifact naming.
//!
//! The artifact name is the only cache key: a preview for `render.png` always
//! lives at `<temp>/render_minify.png`, whatever storage class the original
//! came from. Existence of that file is the cache-hit check.

/// Marker inserted between stem and extension.
pub const ARTIFACT_MARKER: &str = "_minify";

/// Map an original filename to its derived-artifact filename.
///
/// Only the final path component is used. It is split at its last `.` into
/// stem and extension (a leading dot does not start an extension, and a
/// trailing dot leaves the extension empty), and the marker is inserted
/// between the two:
///
/// ```
/// use comfy_frontend::preview::artifact_name;
///
/// assert_eq!(artifact_name("render.png"), "render_minify.png");
/// assert_eq!(artifact_name("archive.tar.gz"), "archive.tar_minify.gz");
/// assert_eq!(artifact_name("sub/ComfyUI_0001_.webp"), "ComfyUI_0001__minify.webp");
/// assert_eq!(artifact_name(".hidden"), ".hidden_minify");
/// ```
///
/// The extension is kept as-is even though the artifact holds JPEG data.
pub fn artifact_name(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, extension) = split_extension(name);
    format!("{stem}{ARTIFACT_MARKER}{extension}")
}

/// Split into `(stem, ".ext")`, or `(name, "")` when there is no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}
