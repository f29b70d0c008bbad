//! Prop configs and the placeholder proxies they declare.
//!
//! Props live one per directory under a prop root, each described by a
//! `.cfg` file. The only lines read here are the prop `name` and its `proxy`
//! boxes:
//!
//! ```text
//! name = ButtonSquare
//! proxy = 0, 0.01, 0, 0.02, 0.02, 0.02, 1, 0, 0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use rootcause::Report;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, IResult, failure_from_kind};
use crate::models::mesh::Vec3;
use crate::models::scene::{NodeMarker, SceneNode, Transform};

const TRIM: &[char] = &[' ', '\t', '\n', '\r'];
const DELIMITERS: &[char] = &[' ', '\t', '=', ',', ';'];

#[derive(Debug, Error)]
pub enum PropError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("invalid prop root pattern: {0}")]
    Pattern(String),
    #[error("no placed props to write")]
    NoPlacements,
}

/// A box standing in for a prop while it is being placed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Proxy {
    pub center: Vec3,
    pub size: Vec3,
    /// RGB, white unless the proxy line gives a colour.
    pub color: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Prop {
    /// Name of the directory the config was found in.
    pub directory: String,
    pub config_name: String,
    /// The config's `name` value, or the directory name when it has none.
    pub name: String,
    pub proxies: Vec<Proxy>,
}

fn invalid_proxy(prop: &str, line: &str) -> crate::error::Error {
    failure_from_kind(ErrorKind::MalformedInput(format!(
        "prop `{prop}` has invalid proxy `{line}`; expected \
         `proxy = centerX, centerY, centerZ, sizeX, sizeY, sizeZ {{, colorR, colorG, colorB }}`"
    )))
}

/// Parse a `proxy` line. The line must hold at least the keyword plus six
/// numbers; a colour is only read when exactly three more follow.
pub fn parse_proxy(prop: &str, line: &str) -> IResult<Proxy> {
    let tokens: Vec<&str> = line
        .split(DELIMITERS)
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.len() < 7 {
        return Err(invalid_proxy(prop, line));
    }

    let number = |idx: usize| -> IResult<f32> {
        tokens[idx]
            .parse::<f32>()
            .map_err(|_| invalid_proxy(prop, line))
    };

    let center = [number(1)?, number(2)?, number(3)?];
    let size = [number(4)?, number(5)?, number(6)?];
    let color = if tokens.len() == 10 {
        [number(7)?, number(8)?, number(9)?]
    } else {
        [1.0; 3]
    };

    Ok(Proxy {
        center,
        size,
        color,
    })
}

/// Parse a prop config. Returns `None` when no proxy line is usable; bad
/// proxy lines are logged and skipped.
pub fn parse_prop_config(directory: &str, config_name: &str, text: &str) -> Option<Prop> {
    let mut name = None;
    let mut proxies = Vec::new();

    for raw in text.lines() {
        let line = raw.trim_matches(TRIM).to_lowercase();

        if name.is_none() && line.starts_with("name") {
            let tokens: Vec<&str> = raw
                .split(DELIMITERS)
                .filter(|token| !token.is_empty())
                .collect();
            if let [_, value] = tokens.as_slice() {
                name = Some(value.to_string());
            }
        }

        if line.starts_with("proxy") {
            match parse_proxy(directory, &line) {
                Ok(proxy) => proxies.push(proxy),
                Err(e) => warn!("{e}"),
            }
        }
    }

    if proxies.is_empty() {
        warn!(prop = directory, "config has no usable proxies, skipping");
        return None;
    }

    Some(Prop {
        directory: directory.to_string(),
        config_name: config_name.to_string(),
        name: name.unwrap_or_else(|| directory.to_string()),
        proxies,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read and parse one prop config file.
pub fn load_prop(path: &Path) -> Result<Option<Prop>, Report<PropError>> {
    let text = fs::read_to_string(path)
        .map_err(|e| Report::new(PropError::Io(format!("{}: {e}", path.display()))))?;
    let directory = path.parent().map(file_name).unwrap_or_default();
    if text.trim().is_empty() {
        warn!(prop = %directory, "config is empty, skipping");
        return Ok(None);
    }
    Ok(parse_prop_config(&directory, &file_name(path), &text))
}

/// Find every `<root>/<prop dir>/*.cfg` and parse it. Configs without usable
/// proxies are left out.
pub fn discover_props(root: &Path) -> Result<Vec<Prop>, Report<PropError>> {
    let pattern = PathBuf::from(glob::Pattern::escape(&root.to_string_lossy()))
        .join("*")
        .join("*.cfg");
    let pattern = pattern.to_string_lossy();
    debug!(%pattern, "scanning for prop configs");

    let paths = glob::glob(&pattern).map_err(|e| Report::new(PropError::Pattern(e.to_string())))?;

    let mut props = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| Report::new(PropError::Io(e.to_string())))?;
        if let Some(prop) = load_prop(&path)? {
            props.push(prop);
        }
    }

    if props.is_empty() {
        warn!(root = %root.display(), "no valid props found");
    } else {
        info!(count = props.len(), "props loaded");
    }
    Ok(props)
}

/// A prop placed in a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct PropPlacement {
    pub name: String,
    pub transform: Transform,
}

/// Every node marked as a placed prop, in depth-first order. Marked nodes are
/// excluded from model export, so this walks the whole tree.
pub fn placements(root: &SceneNode) -> Vec<PropPlacement> {
    fn visit(node: &SceneNode, out: &mut Vec<PropPlacement>) {
        if node.marker.as_ref().is_some_and(NodeMarker::is_prop_object) {
            out.push(PropPlacement {
                name: node.name.clone(),
                transform: node.transform,
            });
        }
        for child in &node.children {
            visit(child, out);
        }
    }

    let mut out = Vec::new();
    visit(root, &mut out);
    out
}

/// Sample `INTERNAL` block listing each placement, meant to be pasted into a
/// part config.
pub fn internal_config(placements: &[PropPlacement]) -> Result<String, Report<PropError>> {
    if placements.is_empty() {
        return Err(Report::new(PropError::NoPlacements));
    }

    let mut lines = vec![
        "// Sample prop config, not to be used on its own. Copy this into the Part config."
            .to_string(),
        String::new(),
        "INTERNAL".to_string(),
        "{".to_string(),
        "\tname = INSERT_INTERNAL_NAME".to_string(),
    ];
    for placement in placements {
        let Transform {
            position,
            rotation,
            scale,
        } = placement.transform;
        lines.extend([
            "\tPROP".to_string(),
            "\t{".to_string(),
            format!("\t\tname = {}", placement.name),
            format!("\t\tposition = {}", position.iter().join(", ")),
            format!("\t\trotation = {}", rotation.iter().join(", ")),
            format!("\t\tscale = {}", scale.iter().join(", ")),
            "\t}".to_string(),
        ]);
    }
    lines.push("}".to_string());

    Ok(lines.iter().map(|line| format!("{line}\n")).collect())
}
