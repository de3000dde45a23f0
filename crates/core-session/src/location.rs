//! Location line structuring.
//!
//! The location header of a division shows the focused resource's path as
//! typed fields so the renderer can color separators, directories, and the
//! final component by its filesystem kind. Classification is supplied by
//! the caller so the structuring stays pure.

use core_syntax::{Field, FieldClass};

/// Filesystem classification of a path component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Directory,
    File,
    Executable,
    Link,
    Missing,
}

/// Structure a path string into location fields.
pub fn structure_path(path: &str, kind_of: &dyn Fn(&str) -> PathKind) -> Vec<Field> {
    let mut out: Vec<Field> = Vec::new();
    if path.is_empty() {
        out.push((FieldClass::PathEmpty, String::new()));
        return out;
    }

    if let Some(rest) = path.strip_prefix('/') {
        out.push((FieldClass::FilesystemRoot, "/".to_string()));
        structure_relative(rest, path, kind_of, &mut out);
    } else {
        structure_relative(path, path, kind_of, &mut out);
    }
    out
}

fn structure_relative(
    rest: &str,
    full: &str,
    kind_of: &dyn Fn(&str) -> PathKind,
    out: &mut Vec<Field>,
) {
    let components: Vec<&str> = rest.split('/').collect();
    let last = components.len().saturating_sub(1);

    let mut prefix_len = full.len() - rest.len();
    for (i, component) in components.iter().enumerate() {
        if i > 0 {
            out.push((FieldClass::PathSeparator, "/".to_string()));
        }
        if component.is_empty() {
            out.push((FieldClass::PathEmpty, String::new()));
            prefix_len += 1;
            continue;
        }

        let class = if i < last {
            match kind_of(&full[..prefix_len + component.len()]) {
                PathKind::Link => FieldClass::PathLink,
                _ => FieldClass::PathDirectory,
            }
        } else {
            // The final component carries the full classification.
            if component.starts_with('.') {
                FieldClass::DotFile
            } else {
                match kind_of(full) {
                    PathKind::Directory => FieldClass::Directory,
                    PathKind::Executable => FieldClass::Executable,
                    PathKind::Link => FieldClass::Link,
                    PathKind::Missing => FieldClass::FileNotFound,
                    PathKind::File => FieldClass::Data,
                }
            }
        };
        out.push((class, component.to_string()));
        prefix_len += component.len() + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(path: &str) -> PathKind {
        match path {
            "/usr" | "/usr/bin" => PathKind::Directory,
            "/usr/bin/prism" => PathKind::Executable,
            "/tmp/gone" => PathKind::Missing,
            _ => PathKind::File,
        }
    }

    #[test]
    fn absolute_path_fields() {
        let fields = structure_path("/usr/bin/prism", &kinds);
        assert_eq!(fields[0], (FieldClass::FilesystemRoot, "/".to_string()));
        assert!(
            fields
                .iter()
                .any(|(c, t)| *c == FieldClass::PathDirectory && t == "usr")
        );
        assert_eq!(
            fields.last().unwrap(),
            &(FieldClass::Executable, "prism".to_string())
        );
    }

    #[test]
    fn missing_final_component() {
        let fields = structure_path("/tmp/gone", &kinds);
        assert_eq!(
            fields.last().unwrap(),
            &(FieldClass::FileNotFound, "gone".to_string())
        );
    }

    #[test]
    fn dot_files_classified() {
        let fields = structure_path("/home/.config", &kinds);
        assert_eq!(
            fields.last().unwrap(),
            &(FieldClass::DotFile, ".config".to_string())
        );
    }

    #[test]
    fn separators_between_components() {
        let fields = structure_path("/a/b/c", &kinds);
        let seps = fields
            .iter()
            .filter(|(c, _)| *c == FieldClass::PathSeparator)
            .count();
        assert_eq!(seps, 2);
    }

    #[test]
    fn field_texts_reassemble_path() {
        let path = "/usr/bin/prism";
        let fields = structure_path(path, &kinds);
        let joined: String = fields.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(joined, path);
    }

    #[test]
    fn empty_path_is_empty_class() {
        let fields = structure_path("", &kinds);
        assert_eq!(fields[0].0, FieldClass::PathEmpty);
    }
}
