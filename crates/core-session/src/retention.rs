//! Session snapshot retention and restoration.
//!
//! The snapshot is a plain UTF-8 text of records: a header line opens each
//! record and tab-indented lines carry its body. The leader record holds
//! the session title and `"<focused_frame> <frame_count>"`; each frame
//! record carries a layout descriptor line (`"<n>"` or `"<n>*<width>"` per
//! vertical), one line per stacked refraction in the form
//! `<system><absolute_path>/<offsets>`, a `-` line delimiting divisions,
//! and a final `"<vertical> <division> <level_per_division...>"` line.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("snapshot leader record missing or malformed")]
    MalformedLeader,
    #[error("frame {0}: malformed layout descriptor {1:?}")]
    MalformedLayout(usize, String),
    #[error("frame {0}: missing focus status line")]
    MissingFocus(usize),
}

/// One stacked refraction selection: the resource path (with its system
/// context prefix) and the view/cursor offsets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub path: Option<String>,
    pub positions: Vec<usize>,
}

impl Selection {
    pub fn absent() -> Self {
        Self::default()
    }

    fn parse(line: &str) -> Selection {
        let Some((rpath, vpositions)) = line.rsplit_once('/') else {
            return Selection::absent();
        };
        if rpath.is_empty() && vpositions == "dev/null" || rpath == "-" || rpath == "None" {
            return Selection::absent();
        }
        // "/dev/null" arrives as rpath="/dev" positions="null".
        if rpath == "/dev" && vpositions == "null" {
            return Selection::absent();
        }

        let positions = vpositions
            .split_whitespace()
            .filter_map(|x| x.parse::<usize>().ok())
            .collect();
        Selection {
            path: Some(rpath.to_string()),
            positions,
        }
    }

    fn sequence(&self) -> String {
        match &self.path {
            None => "-".to_string(),
            Some(p) => {
                if self.positions.iter().sum::<usize>() > 0 {
                    let joined = self
                        .positions
                        .iter()
                        .map(|x| x.to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    format!("{p}/{joined}")
                } else {
                    format!("{p}/")
                }
            }
        }
    }
}

/// A frame's retained configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameRecord {
    pub id: Option<String>,
    pub vertical: usize,
    pub division: usize,
    /// `(division_count, width)` per vertical stripe.
    pub layout: Vec<(usize, usize)>,
    /// Stacked selections per division, in pane order.
    pub stacks: Vec<Vec<Selection>>,
    /// Visible stack level per division.
    pub levels: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub title: String,
    pub focused: usize,
    pub frames: Vec<FrameRecord>,
}

fn layout_string(layout: &[(usize, usize)]) -> String {
    layout
        .iter()
        .map(|(count, width)| {
            if *width != 1 {
                format!("{count}*{width}")
            } else {
                count.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_layout(frame: usize, line: &str) -> Result<Vec<(usize, usize)>, RetentionError> {
    let mut out = Vec::new();
    for s in line.split_whitespace() {
        let parsed = if let Some((x, width)) = s.split_once('*') {
            x.parse::<usize>()
                .ok()
                .zip(width.parse::<usize>().ok())
        } else {
            s.parse::<usize>().ok().map(|x| (x, 1))
        };
        match parsed {
            Some(p) => out.push(p),
            None => return Err(RetentionError::MalformedLayout(frame, line.to_string())),
        }
    }
    if out.is_empty() {
        return Err(RetentionError::MalformedLayout(frame, line.to_string()));
    }
    Ok(out)
}

/// Serialize the session image.
pub fn sequence_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&snapshot.title);
    out.push('\n');
    out.push_str(&format!(
        "\t{} {}\n",
        snapshot.focused,
        snapshot.frames.len()
    ));

    for frame in &snapshot.frames {
        out.push_str(frame.id.as_deref().unwrap_or(""));
        out.push('\n');
        out.push_str(&format!("\t{}\n", layout_string(&frame.layout)));

        for stack in &frame.stacks {
            for selection in stack {
                out.push_str(&format!("\t{}\n", selection.sequence()));
            }
            out.push_str("\t-\n");
        }

        let levels = frame
            .levels
            .iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!("\t{} {} {}\n", frame.vertical, frame.division, levels));
    }
    out
}

/// Structure a snapshot image back into records.
pub fn structure_snapshot(text: &str) -> Result<SessionSnapshot, RetentionError> {
    // Group records: a header line followed by its indented body.
    let mut records: Vec<(String, Vec<String>)> = Vec::new();
    for line in text.lines() {
        if let Some(body) = line.strip_prefix('\t') {
            match records.last_mut() {
                Some((_, lines)) => lines.push(body.to_string()),
                None => return Err(RetentionError::MalformedLeader),
            }
        } else {
            records.push((line.to_string(), Vec::new()));
        }
    }

    let mut iter = records.into_iter();
    let (title, leader_body) = iter.next().ok_or(RetentionError::MalformedLeader)?;
    let leader = leader_body.first().ok_or(RetentionError::MalformedLeader)?;
    let mut leader_fields = leader.split_whitespace();
    let focused: usize = leader_fields
        .next()
        .and_then(|x| x.parse().ok())
        .ok_or(RetentionError::MalformedLeader)?;
    let declared: usize = leader_fields
        .next()
        .and_then(|x| x.parse().ok())
        .ok_or(RetentionError::MalformedLeader)?;

    let mut frames = Vec::new();
    for (fi, (id, lines)) in iter.enumerate() {
        if lines.is_empty() {
            return Err(RetentionError::MissingFocus(fi));
        }
        let layout = parse_layout(fi, &lines[0])?;

        // The final line is the focus status.
        let status = lines.last().ok_or(RetentionError::MissingFocus(fi))?;
        let mut sfields = status.split_whitespace();
        let vertical: usize = sfields.next().and_then(|x| x.parse().ok()).unwrap_or(0);
        let division: usize = sfields.next().and_then(|x| x.parse().ok()).unwrap_or(0);
        let mut levels: Vec<usize> = sfields.filter_map(|x| x.parse().ok()).collect();

        let mut stacks: Vec<Vec<Selection>> = vec![Vec::new()];
        for line in &lines[1..lines.len() - 1] {
            if line == "-" {
                stacks.push(Vec::new());
                continue;
            }
            if line.contains('/') && !line.starts_with('#') {
                if let Some(stack) = stacks.last_mut() {
                    stack.push(Selection::parse(line));
                }
            }
        }
        // A trailing delimiter leaves one empty stack behind.
        if stacks.last().is_some_and(|s| s.is_empty()) && stacks.len() > 1 {
            stacks.pop();
        }

        // Compensate for missing levels.
        while levels.len() < stacks.len() {
            levels.push(0);
        }

        frames.push(FrameRecord {
            id: if id.is_empty() { None } else { Some(id) },
            vertical,
            division,
            layout,
            stacks,
            levels,
        });
    }

    if frames.len() != declared {
        // Tolerated: the declared count is advisory for readers.
        tracing::warn!(
            target: "session.retention",
            declared,
            found = frames.len(),
            "snapshot_frame_count_mismatch"
        );
    }

    Ok(SessionSnapshot {
        title,
        focused,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionSnapshot {
        SessionSnapshot {
            title: "workspace".to_string(),
            focused: 0,
            frames: vec![
                FrameRecord {
                    id: Some("main".to_string()),
                    vertical: 0,
                    division: 1,
                    layout: vec![(2, 1), (1, 2)],
                    stacks: vec![
                        vec![Selection {
                            path: Some("file://host/src/main.rs".to_string()),
                            positions: vec![10, 4, 0],
                        }],
                        vec![
                            Selection {
                                path: Some("file://host/src/lib.rs".to_string()),
                                positions: vec![],
                            },
                            Selection {
                                path: Some("file://host/README".to_string()),
                                positions: vec![3, 0, 0],
                            },
                        ],
                        // A division may be retained with nothing stacked.
                        vec![],
                    ],
                    levels: vec![0, 1, 0],
                },
                FrameRecord {
                    id: None,
                    vertical: 0,
                    division: 0,
                    layout: vec![(1, 0)],
                    stacks: vec![vec![Selection {
                        path: Some("file://host/notes".to_string()),
                        positions: vec![],
                    }]],
                    levels: vec![0],
                },
            ],
        }
    }

    #[test]
    fn round_trip() {
        let snap = sample();
        let text = sequence_snapshot(&snap);
        let parsed = structure_snapshot(&text).unwrap();
        assert_eq!(parsed, snap);
    }

    #[test]
    fn layout_descriptor_forms() {
        assert_eq!(layout_string(&[(1, 1), (2, 2)]), "1 2*2");
        assert_eq!(parse_layout(0, "1 2*2").unwrap(), vec![(1, 1), (2, 2)]);
        assert!(parse_layout(0, "x*y").is_err());
        assert!(parse_layout(0, "").is_err());
    }

    #[test]
    fn absent_selection_forms() {
        assert_eq!(Selection::parse("-"), Selection::absent());
        assert_eq!(Selection::parse("/dev/null"), Selection::absent());
        let s = Selection::parse("file://h/tmp/x/5 2 0");
        assert_eq!(s.path.as_deref(), Some("file://h/tmp/x"));
        assert_eq!(s.positions, vec![5, 2, 0]);
    }

    #[test]
    fn zero_positions_serialize_bare() {
        let s = Selection {
            path: Some("file://h/a".to_string()),
            positions: vec![0, 0],
        };
        assert_eq!(s.sequence(), "file://h/a/");
    }

    #[test]
    fn malformed_leader_rejected() {
        assert!(structure_snapshot("").is_err());
        assert!(structure_snapshot("title\n\tnot numbers\n").is_err());
    }

    #[test]
    fn malformed_frames_surface_errors() {
        let text = "t\n\t0 1\nframe\n\tbad*layout\n\t-\n\t0 0 0\n";
        assert!(matches!(
            structure_snapshot(text),
            Err(RetentionError::MalformedLayout(0, _))
        ));
    }

    #[test]
    fn count_mismatch_tolerated() {
        let snap = sample();
        let mut text = sequence_snapshot(&snap);
        // Declare three frames while providing two.
        text = text.replacen("\t0 2\n", "\t0 3\n", 1);
        let parsed = structure_snapshot(&text).unwrap();
        assert_eq!(parsed.frames.len(), 2);
    }
}
