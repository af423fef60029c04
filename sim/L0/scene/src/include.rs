//! `<include>` directives for robot placement.
//!
//! The robot model is not merged into the kitchen scene. It stays in its own
//! file and is pulled in by an `<include file="..."/>` line spliced into the
//! scene text, right after the opening `<mujoco>` tag.

use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use tracing::info;

use crate::compose::set_body_pose;
use crate::document::SceneDocument;
use crate::error::{Result, SceneError};
use crate::orientation::Pose;

/// Opening tag of an MJCF document.
pub const MUJOCO_MARKER: &str = "<mujoco";

/// Suffix of the posed robot copy written by [`posed_robot_include`].
const POSED_SUFFIX: &str = "_posed";

/// Render `<include file="path"/>`.
pub fn include_directive(path: &Path) -> String {
    format!(r#"<include file="{}"/>"#, escape(path.to_string_lossy().as_ref()))
}

/// Insert `directive` on its own line right after the start tag opened by
/// `after_marker`.
///
/// This is a text splice, not a tree edit: the rest of `text` is kept byte
/// for byte, comments and formatting included. Occurrences inside comments,
/// and longer tag names sharing the marker as a prefix, are skipped.
///
/// # Errors
///
/// Returns [`SceneError::MalformedScene`] if no start tag matches the marker,
/// if the tag is never closed, or if it is self-closing and so has no content
/// to hold the directive.
pub fn insert_include_directive(text: &str, directive: &str, after_marker: &str) -> Result<String> {
    let start = find_start_tag(text, after_marker)
        .ok_or_else(|| SceneError::malformed(after_marker, "scene text"))?;
    let close = tag_end(text, start + after_marker.len())
        .ok_or_else(|| SceneError::malformed(after_marker, "unterminated start tag"))?;
    if text[..close].ends_with('/') {
        return Err(SceneError::malformed(after_marker, "self-closing root has no content"));
    }

    let (head, tail) = text.split_at(close + 1);
    let mut out = String::with_capacity(text.len() + directive.len() + 2);
    out.push_str(head);
    out.push('\n');
    out.push_str(directive);
    if !tail.starts_with('\n') && !tail.starts_with("\r\n") {
        out.push('\n');
    }
    out.push_str(tail);
    Ok(out)
}

/// Byte offset of the first `marker` that opens a tag outside a comment.
fn find_start_tag(text: &str, marker: &str) -> Option<usize> {
    text.match_indices(marker).map(|(at, _)| at).find(|&at| {
        let boundary = text[at + marker.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace() || c == '>' || c == '/');
        boundary && !inside_comment(text, at)
    })
}

fn inside_comment(text: &str, at: usize) -> bool {
    let before = &text[..at];
    match before.rfind("<!--") {
        Some(open) => !before[open..].contains("-->"),
        None => false,
    }
}

/// Offset of the `>` closing the tag whose attributes start at `from`.
fn tag_end(text: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(from + i),
            (None, _) => {}
        }
    }
    None
}

/// Write a copy of the robot scene with `base_body` moved to `pose`, and
/// return the include directive for it.
///
/// The copy is written as `<stem>_posed.xml` in `out_dir`. Pass the robot
/// file's own directory to keep its relative mesh paths valid.
///
/// # Errors
///
/// Fails if the robot file cannot be read or parsed, if `base_body` is not
/// in it, or if the copy cannot be written.
pub fn posed_robot_include(
    robot_xml: &Path,
    base_body: &str,
    pose: &Pose,
    out_dir: &Path,
) -> Result<(PathBuf, String)> {
    let robot = SceneDocument::from_file(robot_xml)?;
    let posed = set_body_pose(&robot, base_body, &pose.position, &pose.orientation)?;

    let stem = robot_xml
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "robot".to_string());
    let path = out_dir.join(format!("{stem}{POSED_SUFFIX}.xml"));
    posed.write_to(&path)?;

    info!(path = %path.display(), body = base_body, "wrote posed robot scene");
    let directive = include_directive(&path);
    Ok((path, directive))
}

/// Place the robot in `scene`: write the posed robot copy into `out_dir` and
/// splice its include right after the scene's `<mujoco>` tag.
///
/// # Errors
///
/// Fails like [`posed_robot_include`], or if the spliced scene does not parse.
pub fn include_robot(
    scene: &SceneDocument,
    robot_xml: &Path,
    base_body: &str,
    pose: &Pose,
    out_dir: &Path,
) -> Result<SceneDocument> {
    let (_, directive) = posed_robot_include(robot_xml, base_body, pose, out_dir)?;
    let text = insert_include_directive(&scene.to_xml_string()?, &directive, MUJOCO_MARKER)?;
    SceneDocument::parse(&text)
}
