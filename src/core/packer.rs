/*
 * Turns the selected paths into an ordered sequence of size-bounded export
 * segments, and builds the plain-text copy of the same selection.
 *
 * Packing is split into two steps. `collect_export_input` reads and classifies
 * every selected path, sorting both the path-only entries and the text entries
 * by their root-relative path. `pack_input` is then a pure function of that
 * input and the options, which is what keeps repeated exports byte-identical.
 *
 * Accounting: every emitted line costs its character count plus one for the
 * newline. Lines are appended in atomic units; a unit that does not fit the
 * remaining budget starts a new segment. Only single lines can be larger than
 * a whole segment's budget, and such a line gets a segment of its own instead
 * of being cut.
 */
use crate::core::config::{ConfigError, ExportSettings};
use crate::core::content_classifier::{ContentClassifierOperations, FileClass};
use crate::core::path_utils::relative_display_path;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub enum PackError {
    NoWorkspace,
    Config(ConfigError),
    TemplatesExceedLimit { overhead: usize, limit: usize },
}

impl From<ConfigError> for PackError {
    fn from(err: ConfigError) -> Self {
        PackError::Config(err)
    }
}

impl std::fmt::Display for PackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackError::NoWorkspace => write!(f, "No workspace folder is open"),
            PackError::Config(e) => write!(f, "{e}"),
            PackError::TemplatesExceedLimit { overhead, limit } => write!(
                f,
                "Export templates need {overhead} characters, leaving no room within the limit of {limit}"
            ),
        }
    }
}

impl std::error::Error for PackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PackError::Config(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PackError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTemplates {
    pub start: String,
    pub continuation: String,
    pub end: String,
}

/*
 * Whether a file's header may end up in a different segment than its content.
 * `KeepWithContent` binds the header to the first content line and the footer
 * to the last one, as long as the pair fits an empty segment; `AllowSplit`
 * treats every line on its own.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPolicy {
    KeepWithContent,
    AllowSplit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    pub character_limit: usize,
    pub templates: ExportTemplates,
    pub header_policy: HeaderPolicy,
}

impl PackOptions {
    pub fn from_settings(settings: &ExportSettings) -> Result<Self> {
        Ok(PackOptions {
            character_limit: settings.require_character_limit()?,
            templates: ExportTemplates {
                start: settings.export_start_template.clone(),
                continuation: settings.export_continuation_template.clone(),
                end: settings.export_end_template.clone(),
            },
            header_policy: if settings.keep_header_with_content {
                HeaderPolicy::KeepWithContent
            } else {
                HeaderPolicy::AllowSplit
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSegment {
    prefix: String,
    lines: Vec<String>,
    suffix: String,
    character_count: usize,
}

impl ExportSegment {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /* Characters of prefix, body and suffix together. */
    pub fn character_count(&self) -> usize {
        self.character_count
    }

    pub fn body(&self) -> String {
        let mut body = String::new();
        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }
        body
    }

    /* The full segment text, wrapper templates included. */
    pub fn text(&self) -> String {
        format!("{}{}{}", self.prefix, self.body(), self.suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub relative_path: String,
    pub content: String,
}

/*
 * The classified, sorted selection: what the packer lays out.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportInput {
    pub non_text: Vec<String>,
    pub text: Vec<TextEntry>,
}

impl ExportInput {
    pub fn is_empty(&self) -> bool {
        self.non_text.is_empty() && self.text.is_empty()
    }
}

pub fn header_line(relative_path: &str) -> String {
    format!("------- {relative_path} -----")
}

pub fn footer_line(relative_path: &str) -> String {
    format!("------- end of {relative_path} -----")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn line_cost(line: &str) -> usize {
    char_len(line) + 1
}

pub fn collect_export_input(
    selected: &[PathBuf],
    root: &Path,
    classifier: &dyn ContentClassifierOperations,
) -> ExportInput {
    let mut input = ExportInput::default();
    for path in selected {
        let relative_path = relative_display_path(path, root);
        match classifier.classify(path) {
            FileClass::Text(content) => input.text.push(TextEntry {
                relative_path,
                content,
            }),
            FileClass::Unreadable(reason) => {
                log::warn!("ExportPacker: {path:?} referenced by path only: {reason}");
                input.non_text.push(relative_path);
            }
            other => {
                log::debug!("ExportPacker: {path:?} referenced by path only ({other:?}).");
                input.non_text.push(relative_path);
            }
        }
    }
    input.non_text.sort();
    input.text.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    input
}

/*
 * Binds `lines` into one unit when they fit `budget` together. Otherwise every
 * line stands alone, so only a single line can ever exceed a segment.
 */
fn push_bound_lines(units: &mut Vec<Vec<String>>, lines: Vec<String>, budget: usize) {
    let cost: usize = lines.iter().map(|line| line_cost(line)).sum();
    if cost <= budget || lines.len() <= 1 {
        units.push(lines);
    } else {
        units.extend(lines.into_iter().map(|line| vec![line]));
    }
}

/*
 * Splits a text entry into packing units. `fresh_budget` is the smallest budget
 * an empty segment can offer; a header or footer is only bound to content when
 * the pair fits it.
 */
fn text_entry_units(
    entry: &TextEntry,
    policy: HeaderPolicy,
    fresh_budget: usize,
) -> Vec<Vec<String>> {
    let header = header_line(&entry.relative_path);
    let footer = footer_line(&entry.relative_path);
    let mut lines: Vec<String> = entry.content.lines().map(str::to_string).collect();

    let mut units = Vec::with_capacity(lines.len() + 2);
    match policy {
        HeaderPolicy::AllowSplit => {
            units.push(vec![header]);
            units.extend(lines.into_iter().map(|line| vec![line]));
            units.push(vec![footer]);
        }
        HeaderPolicy::KeepWithContent => {
            if lines.len() <= 1 {
                let mut unit = vec![header];
                unit.append(&mut lines);
                unit.push(footer);
                push_bound_lines(&mut units, unit, fresh_budget);
                return units;
            }
            let last = lines.pop().unwrap_or_default();
            let mut rest = lines.into_iter();
            let first = rest.next().unwrap_or_default();
            push_bound_lines(&mut units, vec![header, first], fresh_budget);
            units.extend(rest.map(|line| vec![line]));
            push_bound_lines(&mut units, vec![last, footer], fresh_budget);
        }
    }
    units
}

/*
 * Lays out classified input into segments. The start template goes on the
 * first segment, the continuation template ends every segment but the last,
 * and the end template ends the last one. Since the last segment is only known
 * at the end, every segment reserves room for the longer of the two suffixes.
 * Empty input produces no segments.
 */
pub fn pack_input(input: &ExportInput, options: &PackOptions) -> Result<Vec<ExportSegment>> {
    let limit = options.character_limit;
    let start_len = char_len(&options.templates.start);
    let suffix_reserve =
        char_len(&options.templates.continuation).max(char_len(&options.templates.end));
    if start_len + suffix_reserve >= limit {
        return Err(PackError::TemplatesExceedLimit {
            overhead: start_len + suffix_reserve,
            limit,
        });
    }
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let first_budget = limit - start_len - suffix_reserve;
    let later_budget = limit - suffix_reserve;

    let mut units: Vec<Vec<String>> = input.non_text.iter().map(|p| vec![p.clone()]).collect();
    for entry in &input.text {
        units.extend(text_entry_units(entry, options.header_policy, first_budget));
    }

    let mut bodies: Vec<(Vec<String>, usize)> = Vec::new();
    let mut current_lines: Vec<String> = Vec::new();
    let mut current_count = 0usize;
    for unit in units {
        let cost: usize = unit.iter().map(|line| line_cost(line)).sum();
        let budget = if bodies.is_empty() {
            first_budget
        } else {
            later_budget
        };
        if current_count + cost > budget && !current_lines.is_empty() {
            bodies.push((std::mem::take(&mut current_lines), current_count));
            current_count = 0;
        }
        if cost > later_budget {
            log::debug!("ExportPacker: Unit of {cost} characters exceeds the segment budget.");
        }
        current_lines.extend(unit);
        current_count += cost;
    }
    if !current_lines.is_empty() {
        bodies.push((current_lines, current_count));
    }

    let segment_total = bodies.len();
    let segments = bodies
        .into_iter()
        .enumerate()
        .map(|(index, (lines, body_count))| {
            let prefix = if index == 0 {
                options.templates.start.clone()
            } else {
                String::new()
            };
            let suffix = if index + 1 == segment_total {
                options.templates.end.clone()
            } else {
                options.templates.continuation.clone()
            };
            let character_count = char_len(&prefix) + body_count + char_len(&suffix);
            ExportSegment {
                prefix,
                lines,
                suffix,
                character_count,
            }
        })
        .collect::<Vec<_>>();
    log::debug!(
        "ExportPacker: Packed {} path-only and {} text entries into {} segment(s).",
        input.non_text.len(),
        input.text.len(),
        segments.len()
    );
    Ok(segments)
}

/*
 * Defines the export operations the app layer depends on.
 */
pub trait ExportPackerOperations: Send + Sync {
    /*
     * Packs the selection into segments. `root` is the workspace root relative
     * paths are computed against; without one nothing is produced.
     */
    fn pack(
        &self,
        selected: &[PathBuf],
        root: Option<&Path>,
        options: &PackOptions,
    ) -> Result<Vec<ExportSegment>>;

    /*
     * Concatenates the raw content of every selected file between
     * `------- <relpath> -----` and `------- end of <relpath> -----` lines.
     */
    fn build_copy_text(&self, selected: &[PathBuf], root: Option<&Path>) -> Result<String>;
}

pub struct CoreExportPacker {
    classifier: Arc<dyn ContentClassifierOperations>,
}

impl CoreExportPacker {
    pub fn new(classifier: Arc<dyn ContentClassifierOperations>) -> Self {
        CoreExportPacker { classifier }
    }
}

impl ExportPackerOperations for CoreExportPacker {
    fn pack(
        &self,
        selected: &[PathBuf],
        root: Option<&Path>,
        options: &PackOptions,
    ) -> Result<Vec<ExportSegment>> {
        let root = root.ok_or(PackError::NoWorkspace)?;
        let input = collect_export_input(selected, root, self.classifier.as_ref());
        pack_input(&input, options)
    }

    fn build_copy_text(&self, selected: &[PathBuf], root: Option<&Path>) -> Result<String> {
        let root = root.ok_or(PackError::NoWorkspace)?;
        let mut files: Vec<(String, &PathBuf)> = selected
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| (relative_display_path(p, root), p))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut blocks = Vec::with_capacity(files.len());
        for (relative_path, path) in files {
            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("ExportPacker: Skipping unreadable {path:?} in copy: {e}");
                    continue;
                }
            };
            let content = String::from_utf8_lossy(&bytes);
            let mut block = header_line(&relative_path);
            block.push('\n');
            block.push_str(&content);
            if !content.is_empty() && !content.ends_with('\n') {
                block.push('\n');
            }
            block.push_str(&footer_line(&relative_path));
            block.push('\n');
            blocks.push(block);
        }
        Ok(blocks.join("\n"))
    }
}
