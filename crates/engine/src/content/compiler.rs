use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::{debug, info};

use crate::dialog::{DialogScript, Message};
use crate::AppPaths;

use super::database::{DialogDatabase, DialogDef, DialogDefId};
use super::discovery::{collect_xml_files_sorted, discover_mod_sources};
use super::types::{ContentPlanError, ContentRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} (mod={}, file={}",
            self.code,
            self.message,
            self.mod_id,
            self.file_path.display()
        )?;
        if let Some(loc) = self.location {
            write!(f, ", line={}, column={}", loc.line, loc.column)?;
        }
        write!(f, ")")
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
struct PendingDialogDef {
    def_name: String,
    version_id: i32,
    scripts: Vec<DialogScript>,
}

/// Compiles every `<DialogDef>` from base content and the enabled mods.
///
/// A later mod replaces an earlier definition with the same `defName`;
/// defining a name twice inside one mod is an error.
pub fn compile_dialog_database(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<DialogDatabase, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut merged = BTreeMap::<String, PendingDialogDef>::new();

    for source in sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| read_error(&source.mod_id, error.path, error.source))?;
        let mut seen_in_mod = HashSet::<String>::new();

        for xml_file in xml_files {
            let raw = fs::read_to_string(&xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            let defs = parse_defs_document(&source.mod_id, &xml_file, &raw)?;
            for def in defs {
                if !seen_in_mod.insert(def.def_name.clone()) {
                    return Err(ContentCompileError {
                        code: ContentErrorCode::DuplicateDefInMod,
                        message: format!(
                            "duplicate DialogDef '{}' in mod '{}'",
                            def.def_name, source.mod_id
                        ),
                        mod_id: source.mod_id.clone(),
                        file_path: xml_file.clone(),
                        location: None,
                    });
                }
                if merged.contains_key(&def.def_name) {
                    debug!(def_name = %def.def_name, mod_id = %source.mod_id, "dialog_def_overridden");
                }
                merged.insert(def.def_name.clone(), def);
            }
        }
    }

    let dialog_defs = merged
        .into_values()
        .map(|def| DialogDef {
            id: DialogDefId(0),
            def_name: def.def_name,
            version_id: def.version_id,
            scripts: def.scripts,
        })
        .collect::<Vec<_>>();

    info!(dialog_defs = dialog_defs.len(), "dialog_content_compiled");
    Ok(DialogDatabase::from_dialog_defs(dialog_defs))
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<PendingDialogDef>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let ctx = NodeContext {
        mod_id,
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    root.children()
        .filter(|node| node.is_element())
        .map(|child| {
            if child.tag_name().name() != "DialogDef" {
                return Err(ctx.error(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{}>; expected <DialogDef>",
                        child.tag_name().name()
                    ),
                    child,
                ));
            }
            parse_dialog_def(&ctx, child)
        })
        .collect()
}

struct NodeContext<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl NodeContext<'_, '_> {
    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }
}

fn parse_dialog_def(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingDialogDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut version_id: Option<i32> = None;
    let mut scripts = Vec::<DialogScript>::new();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name();
        // <script> repeats; every other field appears at most once.
        if field_name != "script" && !seen_fields.insert(field_name.to_string()) {
            return Err(ctx.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <DialogDef>"),
                field,
            ));
        }

        match field_name {
            "defName" => def_name = Some(required_text(ctx, field, "defName")?),
            "versionId" => {
                let raw = required_text(ctx, field, "versionId")?;
                let parsed = raw.parse::<i32>().map_err(|_| {
                    ctx.error(
                        ContentErrorCode::InvalidValue,
                        format!("versionId must be an integer, got '{raw}'"),
                        field,
                    )
                })?;
                version_id = Some(parsed);
            }
            "script" => scripts.push(parse_script(ctx, field)?),
            _ => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <DialogDef>"),
                    field,
                ));
            }
        }
    }

    let def_name = def_name.ok_or_else(|| {
        ctx.error(
            ContentErrorCode::MissingField,
            "missing required field <defName> in <DialogDef>".to_string(),
            node,
        )
    })?;

    Ok(PendingDialogDef {
        def_name,
        version_id: version_id.unwrap_or(0),
        scripts,
    })
}

fn parse_script(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<DialogScript, ContentCompileError> {
    let play_once = bool_attribute(ctx, node, "playOnce")?;
    let mut messages = Vec::<Message>::new();

    for child in node.children().filter(|child| child.is_element()) {
        if child.tag_name().name() != "message" {
            return Err(ctx.error(
                ContentErrorCode::UnknownField,
                format!(
                    "unknown field <{}> in <script>; expected <message>",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        let text = required_text(ctx, child, "message")?;
        let requires_turn_head = bool_attribute(ctx, child, "turnHead")?;
        messages.push(Message::new(text, requires_turn_head));
    }

    if messages.is_empty() {
        return Err(ctx.error(
            ContentErrorCode::InvalidValue,
            "<script> must contain at least one <message>".to_string(),
            node,
        ));
    }
    Ok(DialogScript::new(messages, play_once))
}

fn required_text(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentCompileError> {
    let text = node.text().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(ctx.error(
            ContentErrorCode::MissingField,
            format!("field <{field_name}> must have non-empty text"),
            node,
        ));
    }
    Ok(text.to_string())
}

/// Absent attributes read as `false`.
fn bool_attribute(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<bool, ContentCompileError> {
    match node.attribute(name).map(str::trim) {
        None => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(ctx.error(
            ContentErrorCode::InvalidValue,
            format!("attribute {name} must be true or false, got '{other}'"),
            node,
        )),
    }
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentPlanError, root: &Path) -> ContentCompileError {
    let (mod_id, file_path) = match &error {
        ContentPlanError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => (mod_id.clone(), expected_dir.clone()),
        ContentPlanError::DuplicateEnabledMod { mod_id } => (mod_id.clone(), root.to_path_buf()),
        ContentPlanError::EmptyEnabledMod => ("unknown".to_string(), root.to_path_buf()),
    };
    ContentCompileError {
        code: ContentErrorCode::Discovery,
        message: error.to_string(),
        mod_id,
        file_path,
        location: None,
    }
}
