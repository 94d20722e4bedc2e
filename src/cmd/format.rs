/*!
format.rs

Human output helpers for `xds-cli`.

  - Tab-aligned listing tables (borderless `tabled` rendering)
  - Key/value detail blocks for single items
  - Timestamp prefixing for streamed command output

All helpers return strings; callers decide where to print.
*/

use tabled::builder::Builder;
use tabled::settings::{Padding, Style};

use crate::agent::types::{ProjectConfig, Sdk};

/* -------------------------------------------------------------------------- */
/* Tables                                                                     */
/* -------------------------------------------------------------------------- */

/// Borderless table; every line starts with `indent` spaces and columns are
/// separated by at least two spaces.
pub fn aligned(rows: &[Vec<String>], indent: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut builder = Builder::default();
    for row in rows {
        builder.push_record(row.iter().map(String::as_str));
    }
    let mut table = builder.build();
    table
        .with(Style::empty())
        .with(Padding::new(0, 2, 0, 0));

    let prefix = " ".repeat(indent);
    table
        .to_string()
        .lines()
        .map(|l| format!("{prefix}{}", l.trim_end()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn details(fields: &[(&str, &str)]) -> String {
    let rows: Vec<Vec<String>> = fields
        .iter()
        .map(|(k, v)| vec![(*k).to_string(), (*v).to_string()])
        .collect();
    aligned(&rows, 0)
}

/* -------------------------------------------------------------------------- */
/* SDKs                                                                       */
/* -------------------------------------------------------------------------- */

pub fn sdk_list(sdks: &[Sdk]) -> String {
    if sdks.is_empty() {
        return "No SDKs installed".to_string();
    }
    let mut rows = vec![vec!["ID".to_string(), "NAME".to_string()]];
    rows.extend(sdks.iter().map(|s| vec![s.id.clone(), s.name.clone()]));
    format!("List of installed SDKs:\n{}", aligned(&rows, 2))
}

pub fn sdk_details(sdks: &[Sdk]) -> String {
    sdks.iter()
        .map(|s| {
            details(&[
                ("ID", s.id.as_str()),
                ("Name", s.name.as_str()),
                ("Profile", s.profile.as_str()),
                ("Arch", s.arch.as_str()),
                ("Version", s.version.as_str()),
                ("Path", s.path.as_str()),
            ])
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/* -------------------------------------------------------------------------- */
/* Projects                                                                   */
/* -------------------------------------------------------------------------- */

pub fn project_list(projects: &[ProjectConfig]) -> String {
    if projects.is_empty() {
        return "No projects declared".to_string();
    }
    let mut rows = vec![vec![
        "ID".to_string(),
        "LABEL".to_string(),
        "CLIENT PATH".to_string(),
    ]];
    rows.extend(
        projects
            .iter()
            .map(|p| vec![p.id.clone(), p.label.clone(), p.client_path.clone()]),
    );
    format!("List of existing projects:\n{}", aligned(&rows, 2))
}

pub fn project_details(projects: &[ProjectConfig]) -> String {
    projects
        .iter()
        .map(|p| {
            let in_sync = p.is_in_sync.to_string();
            details(&[
                ("ID", p.id.as_str()),
                ("Label", p.label.as_str()),
                ("Type", p.kind.as_str()),
                ("Status", p.status.as_str()),
                ("In sync", in_sync.as_str()),
                ("Client path", p.client_path.as_str()),
                ("Server path", p.server_path.as_str()),
                ("Default SDK", p.default_sdk.as_str()),
            ])
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/* -------------------------------------------------------------------------- */
/* Streamed output                                                            */
/* -------------------------------------------------------------------------- */

/// `"<timestamp>| <text>"` when `with_timestamp`, else the text unchanged.
pub fn stamp(timestamp: &str, text: &str, with_timestamp: bool) -> String {
    if with_timestamp {
        format!("{timestamp}| {text}")
    } else {
        text.to_string()
    }
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                       */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn sdk(id: &str, name: &str) -> Sdk {
        Sdk {
            id: id.into(),
            name: name.into(),
            profile: "poky-agl".into(),
            version: "4.0.1".into(),
            arch: "aarch64".into(),
            path: "/xdt/sdk/aarch64".into(),
        }
    }

    #[test]
    fn aligned_columns_line_up() {
        let out = aligned(
            &[
                vec!["ID".into(), "NAME".into()],
                vec!["a-long-id".into(), "x".into()],
            ],
            2,
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  ID"));
        assert_eq!(lines[0].find("NAME"), lines[1].find('x'));
    }

    #[test]
    fn sdk_list_has_header_and_rows() {
        let out = sdk_list(&[sdk("id1", "first"), sdk("id2", "second")]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "List of installed SDKs:");
        assert!(lines[1].contains("ID") && lines[1].contains("NAME"));
        assert!(lines[2].contains("id1") && lines[2].contains("first"));
        assert!(lines[3].contains("id2") && lines[3].contains("second"));
    }

    #[test]
    fn sdk_details_blocks_separated_by_blank_line() {
        let out = sdk_details(&[sdk("id1", "first"), sdk("id2", "second")]);
        let blocks: Vec<&str> = out.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        for b in &blocks {
            assert_eq!(b.lines().count(), 6);
        }
        assert!(blocks[0].lines().next().unwrap().contains("id1"));
        assert!(blocks[1].contains("Path"));
        assert!(blocks[1].contains("/xdt/sdk/aarch64"));
    }

    #[test]
    fn empty_lists() {
        assert_eq!(sdk_list(&[]), "No SDKs installed");
        assert_eq!(sdk_details(&[]), "");
        assert_eq!(project_list(&[]), "No projects declared");
    }

    #[test]
    fn project_list_shows_client_path() {
        let p = ProjectConfig {
            id: "p1".into(),
            label: "hello".into(),
            client_path: "/home/u/hello".into(),
            ..Default::default()
        };
        let out = project_list(std::slice::from_ref(&p));
        assert!(out.contains("CLIENT PATH"));
        assert!(out.contains("/home/u/hello"));
        assert!(project_details(&[p]).contains("In sync"));
    }

    #[test]
    fn stamp_prefix() {
        assert_eq!(stamp("12:00", "out\n", true), "12:00| out\n");
        assert_eq!(stamp("12:00", "out\n", false), "out\n");
    }
}
