//! Building a source blob from files, directories or stdin
//!
//! One file is used verbatim. Several files are concatenated in path order, each
//! preceded by a marker line written in that file type's comment syntax:
//!
//! ```text
//! <!-- path: index.html -->
//! /* path: css/site.css */
//! // path: js/app.js
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions picked up when walking a directory
const SOURCE_EXTENSIONS: &[&str] = &["html", "htm", "css", "js", "mjs", "jsx", "json", "txt"];

/// Directories never worth sending to the model
const SKIP_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "vendor"];

/// One file inside a concatenated blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

fn marker_for(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => format!("<!-- path: {} -->", path),
        "css" => format!("/* path: {} */", path),
        _ => format!("// path: {}", path),
    }
}

/// Recognise a marker line and return the path it names.
fn parse_marker(line: &str) -> Option<&str> {
    let line = line.trim();
    let inner = if let Some(rest) = line.strip_prefix("<!--") {
        rest.strip_suffix("-->")?
    } else if let Some(rest) = line.strip_prefix("/*") {
        rest.strip_suffix("*/")?
    } else {
        line.strip_prefix("//")?
    };
    let path = inner.trim().strip_prefix("path:")?.trim();
    (!path.is_empty()).then_some(path)
}

/// Concatenate files into one blob with path markers.
pub fn join_with_markers(files: &[SourceFile]) -> String {
    match files {
        [] => String::new(),
        [single] => single.content.clone(),
        _ => files
            .iter()
            .map(|f| format!("{}\n{}", marker_for(&f.path), f.content.trim_end_matches('\n')))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// Split a blob back into files. Text before the first marker (or a blob with no
/// markers at all) becomes a single file with an empty path.
pub fn split_markers(blob: &str) -> Vec<SourceFile> {
    let mut files = Vec::new();
    let mut current_path: Option<String> = None;
    let mut current = String::new();

    for line in blob.lines() {
        if let Some(path) = parse_marker(line) {
            if current_path.is_some() || !current.trim().is_empty() {
                files.push(SourceFile {
                    path: current_path.take().unwrap_or_default(),
                    content: current.trim_end_matches('\n').to_string(),
                });
            }
            current.clear();
            current_path = Some(path.to_string());
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }

    if current_path.is_some() || !current.trim().is_empty() {
        files.push(SourceFile {
            path: current_path.unwrap_or_default(),
            content: current.trim_end_matches('\n').to_string(),
        });
    }
    files
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn collect_dir(root: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        !(e.file_type().is_dir()
            && e.depth() > 0
            && e.file_name()
                .to_str()
                .map(|name| SKIP_DIRS.contains(&name))
                .unwrap_or(false))
    }) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() && is_source_file(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Load the inputs named on the command line. `-` reads stdin.
///
/// Files given explicitly are read whatever their extension; directories are
/// walked and filtered by extension. Marker paths are relative to the directory
/// they came from, or as given for explicit files.
pub fn load_inputs(inputs: &[PathBuf]) -> Result<String> {
    if inputs.is_empty() || (inputs.len() == 1 && inputs[0].as_os_str() == "-") {
        let mut blob = String::new();
        std::io::stdin()
            .read_to_string(&mut blob)
            .context("Failed to read source from stdin")?;
        return Ok(blob);
    }
    if inputs.iter().any(|input| input.as_os_str() == "-") {
        anyhow::bail!("Standard input (-) cannot be combined with file inputs");
    }

    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for path in collect_dir(input)? {
                let relative = path.strip_prefix(input).unwrap_or(&path);
                files.push(read_source_file(&path, relative)?);
            }
        } else {
            files.push(read_source_file(input, input)?);
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(files = files.len(), "loaded source files");
    Ok(join_with_markers(&files))
}

fn read_source_file(path: &Path, display: &Path) -> Result<SourceFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(SourceFile {
        path: display.to_string_lossy().replace('\\', "/"),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_single_file_is_verbatim() {
        let blob = join_with_markers(&[file("index.html", "<h1>Hi</h1>\n")]);
        assert_eq!(blob, "<h1>Hi</h1>\n");
    }

    #[test]
    fn test_markers_use_file_comment_syntax() {
        let blob = join_with_markers(&[
            file("index.html", "<h1>Hi</h1>"),
            file("css/site.css", "h1 { color: red; }"),
            file("js/app.js", "console.log(1);"),
        ]);
        assert!(blob.contains("<!-- path: index.html -->\n<h1>Hi</h1>"));
        assert!(blob.contains("/* path: css/site.css */\nh1 { color: red; }"));
        assert!(blob.contains("// path: js/app.js\nconsole.log(1);"));
    }

    #[test]
    fn test_split_reverses_join() {
        let files = vec![
            file("index.html", "<main>\n  <p>x</p>\n</main>"),
            file("site.css", "p { margin: 0; }"),
        ];
        assert_eq!(split_markers(&join_with_markers(&files)), files);
    }

    #[test]
    fn test_split_without_markers() {
        let parts = split_markers("<div>plain</div>");
        assert_eq!(parts, vec![file("", "<div>plain</div>")]);
        assert!(split_markers("").is_empty());
    }

    #[test]
    fn test_ordinary_comments_are_not_markers() {
        assert_eq!(parse_marker("// TODO: fix nav"), None);
        assert_eq!(parse_marker("<!-- header -->"), None);
        assert_eq!(parse_marker("/* path: a.css */"), Some("a.css"));
    }

    #[test]
    fn test_load_directory_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        fs::write(dir.path().join("index.html"), "<p>x</p>").unwrap();
        fs::write(dir.path().join("css/site.css"), "p {}").unwrap();
        fs::write(dir.path().join("logo.png"), "binary").unwrap();
        fs::write(dir.path().join("node_modules/lib/x.js"), "skip").unwrap();

        let blob = load_inputs(&[dir.path().to_path_buf()]).unwrap();
        let files = split_markers(&blob);
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["css/site.css", "index.html"]);
    }

    #[test]
    fn test_stdin_mixed_with_files_is_rejected() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("index.html");
        fs::write(&page, "<p>x</p>").unwrap();

        let err = load_inputs(&[page, PathBuf::from("-")]).unwrap_err();
        assert!(err.to_string().contains("Standard input (-)"));
    }
}
