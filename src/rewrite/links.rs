use std::path::Path;

/// Relative link from the page stored at `from_file` to the file `to_file`
///
/// Both paths are relative to the backup root with `/` separators. A target named
/// `index.html` below another directory collapses to that directory (`../` rather than
/// `../index.html`).
///
/// # Examples
///
/// ```
/// use forum_mirror::rewrite::relative_link;
///
/// assert_eq!(relative_link("topics/t1-a.html", "forums/f2-b.html"), "../forums/f2-b.html");
/// assert_eq!(relative_link("topics/t1-a.html", "index.html"), "../");
/// assert_eq!(relative_link("index.html", "topics/t1-a.html"), "topics/t1-a.html");
/// ```
pub fn relative_link(from_file: &str, to_file: &str) -> String {
    let from_dir = Path::new(from_file).parent().unwrap_or_else(|| Path::new(""));
    let mut link = pathdiff::diff_paths(to_file, from_dir)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| to_file.to_string());

    if link.ends_with("/index.html") {
        link.truncate(link.len() - "index.html".len());
    }
    link
}
