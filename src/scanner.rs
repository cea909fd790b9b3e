// SPDX-License-Identifier: MPL-2.0

//! Import scanning for on-disk Go packages.
//!
//! This is the collaborator that source managers use to turn a directory
//! of source files into a package name plus import lists. It understands
//! just enough Go syntax to find the package clause and the import
//! declarations: comments, string literals, and `+build` tag comments
//! appearing before the package clause. Files whose build tags intersect
//! the configured ignore list contribute nothing. Directories under the
//! configured standard-library root are scanned in a read-only mode that
//! skips import extraction.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Scanner configuration. Passed in explicitly at construction; the
/// scanner keeps no process-wide state.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Source roots used by [`ImportScanner::import_path`] to map a
    /// directory to its import path.
    pub src_roots: Vec<PathBuf>,
    /// The standard library source root. Directories below it are scanned
    /// without import extraction.
    pub goroot_src: Option<PathBuf>,
    /// Build tags whose files are ignored entirely. Empty by default.
    /// Richer build-tag evaluation is future work.
    pub ignore_tags: Vec<String>,
}

/// The result of scanning one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedPackage {
    /// The package name from the package clause of the first
    /// non-ignored file, with any `_test` suffix stripped.
    pub package_name: String,
    /// Non-test files that were scanned, sorted.
    pub go_files: Vec<String>,
    /// `_test.go` files that were scanned, sorted.
    pub test_go_files: Vec<String>,
    /// Imports of the non-test files, de-duplicated and sorted.
    pub imports: Vec<String>,
    /// Imports of the test files, de-duplicated and sorted.
    pub test_imports: Vec<String>,
    /// Files skipped because of an ignored build tag, sorted.
    pub ignored_files: Vec<String>,
}

/// Failures surfaced while scanning a directory.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The directory contains no `.go` files.
    #[error("no Go files in {0}")]
    NoGoFiles(PathBuf),

    /// A file could not be read or its package clause and imports could
    /// not be extracted.
    #[error("cannot parse {file}: {detail}")]
    Parse {
        /// The offending file.
        file: PathBuf,
        /// What went wrong.
        detail: String,
    },

    /// The directory lies under none of the configured source roots.
    #[error("{0} is under no configured source root")]
    UnresolvableSrcRoot(PathBuf),
}

/// Scans directories for package names and imports.
#[derive(Debug, Clone, Default)]
pub struct ImportScanner {
    config: ScanConfig,
}

impl ImportScanner {
    /// Creates a scanner with the given configuration.
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scans the `.go` files directly inside `dir` (no recursion).
    pub fn scan_dir(&self, dir: &Path) -> Result<ScannedPackage, ScanError> {
        let mut files = go_files_in(dir)?;
        if files.is_empty() {
            return Err(ScanError::NoGoFiles(dir.to_owned()));
        }
        files.sort();

        let goroot_mode = self
            .config
            .goroot_src
            .as_deref()
            .map_or(false, |g| dir.starts_with(g));

        let mut scanned = ScannedPackage::default();
        for fname in files {
            let path = dir.join(&fname);
            let src = fs::read_to_string(&path).map_err(|e| ScanError::Parse {
                file: path.clone(),
                detail: e.to_string(),
            })?;
            let parsed = parse_go_file(&src).map_err(|detail| ScanError::Parse {
                file: path.clone(),
                detail,
            })?;

            if !goroot_mode
                && parsed
                    .build_tags
                    .iter()
                    .any(|t| self.config.ignore_tags.contains(t))
            {
                scanned.ignored_files.push(fname);
                continue;
            }

            let is_test = fname.ends_with("_test.go");
            let name = if is_test {
                parsed
                    .package_name
                    .strip_suffix("_test")
                    .unwrap_or(&parsed.package_name)
            } else {
                &parsed.package_name
            };
            if scanned.package_name.is_empty() {
                scanned.package_name = name.to_owned();
            }

            if is_test {
                scanned.test_go_files.push(fname);
                if !goroot_mode {
                    scanned.test_imports.extend(parsed.imports);
                }
            } else {
                scanned.go_files.push(fname);
                if !goroot_mode {
                    scanned.imports.extend(parsed.imports);
                }
            }
        }

        uniq(&mut scanned.imports);
        uniq(&mut scanned.test_imports);
        Ok(scanned)
    }

    /// Maps a package directory to its import path through the configured
    /// source roots.
    pub fn import_path(&self, dir: &Path) -> Result<String, ScanError> {
        for root in &self.config.src_roots {
            if let Ok(rel) = dir.strip_prefix(root) {
                let mut parts = Vec::new();
                for comp in rel.components() {
                    match comp.as_os_str().to_str() {
                        Some(part) => parts.push(part),
                        None => return Err(ScanError::UnresolvableSrcRoot(dir.to_owned())),
                    }
                }
                return Ok(parts.join("/"));
            }
        }
        Err(ScanError::UnresolvableSrcRoot(dir.to_owned()))
    }
}

fn go_files_in(dir: &Path) -> Result<Vec<String>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::Parse {
        file: dir.to_owned(),
        detail: e.to_string(),
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::Parse {
            file: dir.to_owned(),
            detail: e.to_string(),
        })?;
        let name = entry.file_name();
        if let Some(name) = name.to_str() {
            if name.ends_with(".go") && entry.path().is_file() {
                files.push(name.to_owned());
            }
        }
    }
    Ok(files)
}

fn uniq(list: &mut Vec<String>) {
    list.sort();
    list.dedup();
}

// Go source parsing ###########################################################

struct ParsedFile {
    package_name: String,
    imports: Vec<String>,
    /// Tags collected from `+build` comment lines before the package
    /// clause.
    build_tags: Vec<String>,
}

/// Extracts the package clause, imports, and pre-package build tags from
/// Go source. Tokenizes comments and strings properly so that `import`
/// inside either is never misread as a declaration.
fn parse_go_file(src: &str) -> Result<ParsedFile, String> {
    let mut tokens = Tokenizer::new(src);
    let mut header_comments: Vec<String> = Vec::new();

    let package_name = loop {
        match tokens.next_token() {
            Some(Tok::Comment(text)) => header_comments.push(text),
            Some(Tok::Ident(kw)) if kw == "package" => match tokens.next_significant() {
                Some(Tok::Ident(name)) => break name,
                _ => return Err("package clause has no name".to_owned()),
            },
            Some(_) => return Err("code before package clause".to_owned()),
            None => return Err("no package clause".to_owned()),
        }
    };

    let mut build_tags = Vec::new();
    for comment in &header_comments {
        for line in comment.lines() {
            if let Some(idx) = line.find("+build ") {
                build_tags.extend(
                    line[idx + "+build ".len()..]
                        .split(|c: char| c.is_whitespace() || c == ',')
                        .filter(|t| !t.is_empty())
                        .map(str::to_owned),
                );
            }
        }
    }

    let mut imports = Vec::new();
    while let Some(tok) = tokens.next_token() {
        let Tok::Ident(kw) = &tok else { continue };
        if kw != "import" {
            continue;
        }
        match tokens.next_significant() {
            Some(Tok::Punct('(')) => loop {
                match tokens.next_significant() {
                    Some(Tok::Punct(')')) => break,
                    Some(Tok::Str(path)) => imports.push(path),
                    // Aliases, dots, and semicolons preceding the path.
                    Some(_) => {}
                    None => return Err("unterminated import block".to_owned()),
                }
            },
            Some(Tok::Str(path)) => imports.push(path),
            // Aliased single-import form: the path is the next string.
            Some(Tok::Ident(_)) | Some(Tok::Punct('.')) => {
                if let Some(Tok::Str(path)) = tokens.next_significant() {
                    imports.push(path);
                }
            }
            _ => {}
        }
    }

    Ok(ParsedFile {
        package_name,
        imports,
        build_tags,
    })
}

enum Tok {
    Ident(String),
    Str(String),
    Punct(char),
    Comment(String),
}

struct Tokenizer<'a> {
    rest: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            rest: src.chars().peekable(),
        }
    }

    fn next_token(&mut self) -> Option<Tok> {
        loop {
            let c = *self.rest.peek()?;
            if c.is_whitespace() {
                self.rest.next();
                continue;
            }
            return Some(match c {
                '/' => {
                    self.rest.next();
                    match self.rest.peek() {
                        Some(&'/') => {
                            self.rest.next();
                            let mut text = String::new();
                            while let Some(&n) = self.rest.peek() {
                                if n == '\n' {
                                    break;
                                }
                                text.push(n);
                                self.rest.next();
                            }
                            Tok::Comment(text)
                        }
                        Some(&'*') => {
                            self.rest.next();
                            let mut text = String::new();
                            let mut prev = '\0';
                            loop {
                                let Some(n) = self.rest.next() else { break };
                                if prev == '*' && n == '/' {
                                    text.pop();
                                    break;
                                }
                                text.push(n);
                                prev = n;
                            }
                            Tok::Comment(text)
                        }
                        _ => Tok::Punct('/'),
                    }
                }
                '"' => {
                    self.rest.next();
                    let mut text = String::new();
                    while let Some(n) = self.rest.next() {
                        match n {
                            '\\' => {
                                if let Some(escaped) = self.rest.next() {
                                    text.push(escaped);
                                }
                            }
                            '"' => break,
                            _ => text.push(n),
                        }
                    }
                    Tok::Str(text)
                }
                '`' => {
                    self.rest.next();
                    let mut text = String::new();
                    for n in self.rest.by_ref() {
                        if n == '`' {
                            break;
                        }
                        text.push(n);
                    }
                    Tok::Str(text)
                }
                c if c.is_alphanumeric() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(&n) = self.rest.peek() {
                        if n.is_alphanumeric() || n == '_' {
                            ident.push(n);
                            self.rest.next();
                        } else {
                            break;
                        }
                    }
                    Tok::Ident(ident)
                }
                c => {
                    self.rest.next();
                    Tok::Punct(c)
                }
            });
        }
    }

    /// Next token that is not a comment.
    fn next_significant(&mut self) -> Option<Tok> {
        loop {
            match self.next_token()? {
                Tok::Comment(_) => continue,
                tok => return Some(tok),
            }
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn scans_imports_and_test_imports() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "main.go",
            r#"package demo

import (
    "fmt"
    zy "github.com/x/y"
    _ "github.com/x/z"
)

func main() { fmt.Println(zy.V) }
"#,
        );
        write(
            tmp.path(),
            "util.go",
            "package demo\n\nimport \"fmt\"\n\nvar s = \"import \\\"fake\\\"\"\n",
        );
        write(
            tmp.path(),
            "demo_test.go",
            "package demo_test\n\nimport \"testing\"\n\nfunc TestNothing(t *testing.T) {}\n",
        );

        let scanned = ImportScanner::new(ScanConfig::default())
            .scan_dir(tmp.path())
            .unwrap();
        assert_eq!(scanned.package_name, "demo");
        assert_eq!(scanned.go_files, vec!["main.go", "util.go"]);
        assert_eq!(scanned.test_go_files, vec!["demo_test.go"]);
        assert_eq!(
            scanned.imports,
            vec!["fmt", "github.com/x/y", "github.com/x/z"]
        );
        assert_eq!(scanned.test_imports, vec!["testing"]);
        assert!(scanned.ignored_files.is_empty());
    }

    #[test]
    fn ignored_build_tags_drop_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "main.go", "package demo\n\nimport \"fmt\"\n");
        write(
            tmp.path(),
            "cloud.go",
            "// +build appengine\n\npackage demo\n\nimport \"appengine\"\n",
        );

        let scanner = ImportScanner::new(ScanConfig {
            ignore_tags: vec!["appengine".to_owned()],
            ..ScanConfig::default()
        });
        let scanned = scanner.scan_dir(tmp.path()).unwrap();
        assert_eq!(scanned.ignored_files, vec!["cloud.go"]);
        assert_eq!(scanned.imports, vec!["fmt"]);

        // A tag after the package clause is not a build tag.
        let tmp2 = tempfile::tempdir().unwrap();
        write(
            tmp2.path(),
            "main.go",
            "package demo\n\n// +build appengine\n\nimport \"fmt\"\n",
        );
        let scanned = scanner.scan_dir(tmp2.path()).unwrap();
        assert!(scanned.ignored_files.is_empty());
    }

    #[test]
    fn empty_directory_has_no_go_files() {
        let tmp = tempfile::tempdir().unwrap();
        match ImportScanner::new(ScanConfig::default()).scan_dir(tmp.path()) {
            Err(ScanError::NoGoFiles(dir)) => assert_eq!(dir, tmp.path()),
            other => panic!("expected NoGoFiles, got {other:?}"),
        }
    }

    #[test]
    fn goroot_mode_skips_import_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("fmt");
        fs::create_dir(&pkg).unwrap();
        write(&pkg, "print.go", "package fmt\n\nimport \"io\"\n");

        let scanner = ImportScanner::new(ScanConfig {
            goroot_src: Some(tmp.path().to_owned()),
            ..ScanConfig::default()
        });
        let scanned = scanner.scan_dir(&pkg).unwrap();
        assert_eq!(scanned.package_name, "fmt");
        assert_eq!(scanned.go_files, vec!["print.go"]);
        assert!(scanned.imports.is_empty());
    }

    #[test]
    fn import_path_requires_a_source_root() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("github.com").join("x").join("y");

        let scanner = ImportScanner::new(ScanConfig {
            src_roots: vec![tmp.path().to_owned()],
            ..ScanConfig::default()
        });
        assert_eq!(scanner.import_path(&dir).unwrap(), "github.com/x/y");

        let bare = ImportScanner::new(ScanConfig::default());
        assert!(matches!(
            bare.import_path(&dir),
            Err(ScanError::UnresolvableSrcRoot(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_package_clause() {
        assert!(parse_go_file("// just a comment\n").is_err());
        assert!(parse_go_file("func main() {}\n").is_err());
    }
}
