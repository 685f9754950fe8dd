use chrono::{DateTime, FixedOffset};

use crate::git::model::{
    ChangeGroup, CommitEntry, DiffDocument, DiffFile, DiffHunk, DiffLine, DiffLineKind, DiffStats,
    DirtySummary, HeadInfo, RefEntry, StashEntry, StatusEntry, UpstreamInfo,
};

/// Record separator (0x1e) terminating log/ref/stash records
const RECORD_SEP: char = '\x1e';
/// Unit separator (0x1f) between fields within a record
const FIELD_SEP: char = '\x1f';

const DETACHED_HEAD: &str = "(detached)";
const UNKNOWN_HEAD: &str = "(unknown)";

/// Everything a single git status --porcelain=v2 --branch -z call reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatus {
    pub head: HeadInfo,
    pub upstream: Option<UpstreamInfo>,
    pub entries: Vec<StatusEntry>,
    pub summary: DirtySummary,
}

/// Parse git status --porcelain=v2 --branch -z output
///
/// Records are NUL-separated. Branch headers fill in head/upstream data;
/// entry records become [`StatusEntry`] values. Malformed records are dropped.
pub fn parse_status(output: &str) -> ParsedStatus {
    let records: Vec<&str> = output.split('\0').filter(|r| !r.is_empty()).collect();

    let mut head_name: Option<String> = None;
    let mut head_hash: Option<String> = None;
    let mut upstream_name: Option<String> = None;
    let mut ahead: Option<u32> = None;
    let mut behind: Option<u32> = None;
    let mut entries = Vec::new();

    let mut i = 0;
    while i < records.len() {
        let record = records[i];
        i += 1;

        if let Some(header) = record.strip_prefix("# ") {
            let Some((key, value)) = header.split_once(' ') else {
                continue;
            };
            match key {
                "branch.head" => head_name = Some(value.to_string()),
                "branch.oid" => head_hash = Some(value.to_string()),
                "branch.upstream" => upstream_name = Some(value.to_string()),
                "branch.ab" => parse_ahead_behind(value, &mut ahead, &mut behind),
                _ => {}
            }
            continue;
        }

        if record.starts_with("1 ") || record.starts_with("u ") {
            if let Some(entry) = parse_changed_entry(record) {
                entries.push(entry);
            }
        } else if record.starts_with("2 ") {
            // The pre-rename path arrives as its own NUL record right after
            // the rename record; it is consumed here, never as an entry.
            let original = records.get(i).copied();
            if original.is_some() {
                i += 1;
            }
            if let Some(entry) = parse_rename_entry(record, original) {
                entries.push(entry);
            }
        } else if let Some(path) = record.strip_prefix("? ") {
            entries.push(plain_entry(ChangeGroup::Untracked, "?", path));
        } else if let Some(path) = record.strip_prefix("! ") {
            entries.push(plain_entry(ChangeGroup::Ignored, "!", path));
        }
    }

    let detached = head_name
        .as_deref()
        .is_some_and(|name| name.eq_ignore_ascii_case(DETACHED_HEAD));
    let head = HeadInfo {
        ref_name: head_name.unwrap_or_else(|| UNKNOWN_HEAD.to_string()),
        commit_hash: head_hash.unwrap_or_default(),
        detached,
    };

    let upstream = upstream_name
        .filter(|name| !name.trim().is_empty())
        .map(|name| UpstreamInfo {
            name,
            ahead: ahead.unwrap_or(0),
            behind: behind.unwrap_or(0),
        });

    let summary = summarize(&entries);

    ParsedStatus {
        head,
        upstream,
        entries,
        summary,
    }
}

/// Parse branch.ab values like "+2 -1"
fn parse_ahead_behind(value: &str, ahead: &mut Option<u32>, behind: &mut Option<u32>) {
    for part in value.split_whitespace() {
        if let Some(count) = part.strip_prefix('+') {
            *ahead = count.parse().ok();
        } else if let Some(count) = part.strip_prefix('-') {
            *behind = count.parse().ok();
        }
    }
}

// Entry format: 1 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <path>
fn parse_changed_entry(record: &str) -> Option<StatusEntry> {
    let parts: Vec<&str> = record.splitn(9, ' ').collect();
    if parts.len() < 9 {
        return None;
    }

    Some(StatusEntry {
        group: classify(parts[1]),
        code: parts[1].to_string(),
        path: parts[8].to_string(),
        original_path: None,
        submodule: is_submodule(parts[2]),
    })
}

// Rename format: 2 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <X><score> <path>
fn parse_rename_entry(record: &str, original: Option<&str>) -> Option<StatusEntry> {
    let parts: Vec<&str> = record.splitn(10, ' ').collect();
    if parts.len() < 10 {
        return None;
    }

    Some(StatusEntry {
        group: classify(parts[1]),
        code: parts[1].to_string(),
        path: parts[9].to_string(),
        original_path: Some(original?.to_string()),
        submodule: is_submodule(parts[2]),
    })
}

fn plain_entry(group: ChangeGroup, code: &str, path: &str) -> StatusEntry {
    StatusEntry {
        group,
        code: code.to_string(),
        path: path.to_string(),
        original_path: None,
        submodule: false,
    }
}

/// Bucket an XY code. A 'U' on either side wins; entries touching both
/// the index and the working tree count as unstaged, not twice.
fn classify(xy: &str) -> ChangeGroup {
    let bytes = xy.as_bytes();
    if bytes.len() >= 2 {
        if bytes[0] == b'U' || bytes[1] == b'U' {
            return ChangeGroup::Conflicts;
        }

        let staged = bytes[0] != b'.';
        let unstaged = bytes[1] != b'.';
        if staged && !unstaged {
            return ChangeGroup::Staged;
        }
    }

    ChangeGroup::Unstaged
}

// Submodule field is "N..." for ordinary paths, "S<c><m><u>" for submodules.
fn is_submodule(field: &str) -> bool {
    field.starts_with('S')
}

fn summarize(entries: &[StatusEntry]) -> DirtySummary {
    let mut summary = DirtySummary::default();
    for entry in entries {
        match entry.group {
            ChangeGroup::Staged => summary.staged += 1,
            ChangeGroup::Unstaged => summary.unstaged += 1,
            ChangeGroup::Untracked => summary.untracked += 1,
            ChangeGroup::Conflicts => summary.conflicts += 1,
            ChangeGroup::Ignored => summary.ignored += 1,
        }
    }
    summary
}

/// Parse git log output in the %H%x1f%P%x1f%an%x1f%ad%x1f%s%x1f%D%x1e format
///
/// Records with fewer than six fields or an unparseable date are dropped.
pub fn parse_log(output: &str) -> Vec<CommitEntry> {
    separated_records(output)
        .filter_map(|record| {
            let fields: Vec<&str> = record.split(FIELD_SEP).collect();
            if fields.len() < 6 {
                return None;
            }

            Some(CommitEntry {
                hash: fields[0].to_string(),
                parents: fields[1].split_whitespace().map(String::from).collect(),
                author: fields[2].to_string(),
                date: parse_date(fields[3])?,
                subject: fields[4].to_string(),
                decorations: fields[5]
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(String::from)
                    .collect(),
            })
        })
        .collect()
}

/// Parse git for-each-ref output with fields name, full name, hash,
/// committer date, upstream, ahead and behind
pub fn parse_refs(output: &str) -> Vec<RefEntry> {
    separated_records(output)
        .filter_map(|record| {
            let fields: Vec<&str> = record.split(FIELD_SEP).collect();
            if fields.len() < 4 {
                return None;
            }

            Some(RefEntry {
                name: fields[0].to_string(),
                full_name: fields[1].to_string(),
                hash: fields[2].to_string(),
                date: parse_date(fields[3]),
                upstream: fields.get(4).and_then(|v| non_blank(v)),
                ahead: parse_optional_u32(fields.get(5).copied()),
                behind: parse_optional_u32(fields.get(6).copied()),
            })
        })
        .collect()
}

/// Parse git stash list output in the %gd%x1f%cd%x1f%gs%x1e format
pub fn parse_stashes(output: &str) -> Vec<StashEntry> {
    separated_records(output)
        .filter_map(|record| {
            let fields: Vec<&str> = record.split(FIELD_SEP).collect();
            if fields.len() < 3 {
                return None;
            }

            Some(StashEntry {
                name: fields[0].to_string(),
                date: parse_date(fields[1])?,
                message: fields[2].to_string(),
            })
        })
        .collect()
}

// Pretty formats put a newline between records; trim it off before
// splitting fields so the first field stays clean.
fn separated_records(output: &str) -> impl Iterator<Item = &str> {
    output
        .split(RECORD_SEP)
        .map(str::trim)
        .filter(|record| !record.is_empty())
}

/// Parse a unified diff into files, hunks and classified lines
///
/// The walk is stateful: a diff --git marker opens a file, an @@ header
/// opens a hunk, and everything else attaches to the innermost open scope.
/// Lines outside any open scope are skipped.
pub fn parse_diff(output: &str) -> DiffDocument {
    let mut files: Vec<DiffFile> = Vec::new();
    let mut file: Option<DiffFile> = None;
    let mut hunk: Option<DiffHunk> = None;

    for line in output.lines() {
        if let Some(marker) = line.strip_prefix("diff --git ") {
            close_hunk(&mut file, &mut hunk);
            close_file(&mut files, &mut file);

            let (old_path, new_path) = parse_marker_paths(marker);
            file = Some(DiffFile {
                old_path,
                new_path,
                hunks: Vec::new(),
                stats: None,
            });
            continue;
        }

        let Some(current_file) = file.as_mut() else {
            continue;
        };

        if let Some(path) = line.strip_prefix("--- ") {
            current_file.old_path = trim_diff_path(path).to_string();
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            current_file.new_path = trim_diff_path(path).to_string();
            continue;
        }

        if line.starts_with("@@ ") {
            if let Some((old_start, old_count, new_start, new_count)) = parse_hunk_header(line) {
                if let Some(open) = hunk.take() {
                    current_file.hunks.push(open);
                }
                hunk = Some(DiffHunk {
                    old_start,
                    old_count,
                    new_start,
                    new_count,
                    lines: Vec::new(),
                });
            }
            continue;
        }

        let Some(current_hunk) = hunk.as_mut() else {
            continue;
        };

        if let Some(text) = line.strip_prefix('+') {
            current_hunk.lines.push(diff_line(DiffLineKind::Add, text));
        } else if let Some(text) = line.strip_prefix('-') {
            current_hunk
                .lines
                .push(diff_line(DiffLineKind::Remove, text));
        } else if line.starts_with("\\ No newline") {
            current_hunk.lines.push(diff_line(DiffLineKind::Meta, line));
        } else if let Some(text) = line.strip_prefix(' ') {
            current_hunk
                .lines
                .push(diff_line(DiffLineKind::Context, text));
        }
    }

    close_hunk(&mut file, &mut hunk);
    close_file(&mut files, &mut file);

    DiffDocument { files }
}

fn diff_line(kind: DiffLineKind, text: &str) -> DiffLine {
    DiffLine {
        kind,
        text: text.to_string(),
    }
}

fn close_hunk(file: &mut Option<DiffFile>, hunk: &mut Option<DiffHunk>) {
    if let (Some(file), Some(hunk)) = (file.as_mut(), hunk.take()) {
        file.hunks.push(hunk);
    }
}

fn close_file(files: &mut Vec<DiffFile>, file: &mut Option<DiffFile>) {
    if let Some(file) = file.take() {
        files.push(seal_stats(file));
    }
}

/// Stats stay absent when the file has no added or removed lines
fn seal_stats(mut file: DiffFile) -> DiffFile {
    let mut added = 0;
    let mut deleted = 0;
    for hunk in &file.hunks {
        for line in &hunk.lines {
            match line.kind {
                DiffLineKind::Add => added += 1,
                DiffLineKind::Remove => deleted += 1,
                _ => {}
            }
        }
    }

    if added > 0 || deleted > 0 {
        file.stats = Some(DiffStats { added, deleted });
    }
    file
}

// Marker line: diff --git a/<path> b/<path>
fn parse_marker_paths(marker: &str) -> (String, String) {
    let mut parts = marker.split_whitespace();
    let old_path = parts.next().map(trim_diff_path).unwrap_or_default();
    let new_path = parts.next().map(trim_diff_path).unwrap_or_default();
    (old_path.to_string(), new_path.to_string())
}

fn trim_diff_path(raw: &str) -> &str {
    raw.strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw)
}

/// Parse an @@ -<start>[,<count>] +<start>[,<count>] @@ header.
/// An omitted count means one line.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let ranges = line.strip_prefix("@@ ")?;
    let ranges = &ranges[..ranges.find(" @@")?];

    let mut old_range = None;
    let mut new_range = None;
    for part in ranges.split_whitespace() {
        if let Some(range) = part.strip_prefix('-') {
            old_range = parse_range(range);
        } else if let Some(range) = part.strip_prefix('+') {
            new_range = parse_range(range);
        }
    }

    let (old_start, old_count) = old_range?;
    let (new_start, new_count) = new_range?;
    Some((old_start, old_count, new_start, new_count))
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).ok()
}

fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_optional_u32(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}
