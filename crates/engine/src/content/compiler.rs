use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::warn;

use super::database::{PendingSkillDef, PrerequisiteError, SkillDatabase};
use super::types::{BaselineStats, CostCurve, MagnitudeCurve, SkillEffect, MIN_ATTACK_INTERVAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
    DuplicateBaseline,
    UnknownPrerequisite,
    PrerequisiteCycle,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
    pub def_name: Option<String>,
    pub field_name: Option<String>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)?;
        if let Some(def_name) = &self.def_name {
            write!(f, " (def={def_name})")?;
        }
        match self.location {
            Some(loc) => write!(
                f,
                " (file={}, line={}, column={})",
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(f, " (file={})", self.file_path.display()),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
struct Origin {
    file_path: PathBuf,
    location: Option<SourceLocation>,
}

#[derive(Debug, Default)]
struct ParsedDocument {
    baseline: Option<(BaselineStats, Origin)>,
    skills: Vec<(PendingSkillDef, Origin)>,
}

/// Compiles every `*.xml` file under `content_dir` (sorted by relative path)
/// into one database. A defName may appear only once across all files.
pub fn compile_skill_database(content_dir: &Path) -> Result<SkillDatabase, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(content_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut documents = Vec::with_capacity(xml_files.len());
    for xml_file in xml_files {
        let raw = fs::read_to_string(&xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        documents.push(parse_defs_document(&xml_file, &raw)?);
    }
    merge_documents(documents)
}

/// Same as [`compile_skill_database`] for a single in-memory document.
pub fn compile_skill_database_from_str(
    source_name: &str,
    raw: &str,
) -> Result<SkillDatabase, ContentCompileError> {
    let document = parse_defs_document(Path::new(source_name), raw)?;
    merge_documents(vec![document])
}

fn merge_documents(documents: Vec<ParsedDocument>) -> Result<SkillDatabase, ContentCompileError> {
    let mut baseline: Option<(BaselineStats, Origin)> = None;
    let mut merged = BTreeMap::<String, (PendingSkillDef, Origin)>::new();

    for document in documents {
        if let Some((stats, origin)) = document.baseline {
            if let Some((_, first)) = &baseline {
                return Err(ContentCompileError {
                    code: ContentErrorCode::DuplicateBaseline,
                    message: format!(
                        "<Baseline> already defined in {}; only one is allowed",
                        first.file_path.display()
                    ),
                    file_path: origin.file_path,
                    location: origin.location,
                    def_name: None,
                    field_name: None,
                });
            }
            baseline = Some((stats, origin));
        }

        for (def, origin) in document.skills {
            if let Some((_, first)) = merged.get(&def.def_name) {
                return Err(ContentCompileError {
                    code: ContentErrorCode::DuplicateDef,
                    message: format!(
                        "duplicate SkillDef '{}' (first defined in {})",
                        def.def_name,
                        first.file_path.display()
                    ),
                    file_path: origin.file_path,
                    location: origin.location,
                    def_name: Some(def.def_name),
                    field_name: None,
                });
            }
            merged.insert(def.def_name.clone(), (def, origin));
        }
    }

    let origins = merged
        .iter()
        .map(|(name, (_, origin))| (name.clone(), origin.clone()))
        .collect::<HashMap<_, _>>();
    let pending = merged.into_values().map(|(def, _)| def).collect();
    let baseline = baseline.map(|(stats, _)| stats).unwrap_or_default();

    SkillDatabase::from_pending(baseline, pending)
        .map_err(|error| prerequisite_error(error, &origins))
}

fn prerequisite_error(
    error: PrerequisiteError,
    origins: &HashMap<String, Origin>,
) -> ContentCompileError {
    let (code, message, def_name) = match error {
        PrerequisiteError::Unknown {
            def_name,
            prerequisite,
        } => (
            ContentErrorCode::UnknownPrerequisite,
            format!("prerequisite '{prerequisite}' is not a known SkillDef"),
            def_name,
        ),
        PrerequisiteError::SelfReference { def_name } => (
            ContentErrorCode::PrerequisiteCycle,
            "a SkillDef cannot be its own prerequisite".to_string(),
            def_name,
        ),
        PrerequisiteError::Cycle { def_names } => (
            ContentErrorCode::PrerequisiteCycle,
            format!("prerequisite cycle between: {}", def_names.join(", ")),
            def_names.into_iter().next().unwrap_or_default(),
        ),
    };
    let origin = origins.get(&def_name).cloned().unwrap_or(Origin {
        file_path: PathBuf::new(),
        location: None,
    });
    ContentCompileError {
        code,
        message,
        file_path: origin.file_path,
        location: origin.location,
        def_name: Some(def_name),
        field_name: Some("prerequisite".to_string()),
    }
}

fn parse_defs_document(file_path: &Path, raw: &str) -> Result<ParsedDocument, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
        def_name: None,
        field_name: None,
    })?;

    let ctx = NodeContext {
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

    let mut parsed = ParsedDocument::default();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "SkillDef" => {
                let def = parse_skill_def(&ctx, child)?;
                parsed.skills.push((def, ctx.origin(child)));
            }
            "Baseline" => {
                if parsed.baseline.is_some() {
                    return Err(ctx.error(
                        ContentErrorCode::DuplicateBaseline,
                        "only one <Baseline> is allowed".to_string(),
                        child,
                    ));
                }
                parsed.baseline = Some((parse_baseline(&ctx, child)?, ctx.origin(child)));
            }
            other => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownDefType,
                    format!("unsupported def type <{other}>; expected <SkillDef> or <Baseline>"),
                    child,
                ))
            }
        }
    }
    Ok(parsed)
}

fn parse_skill_def(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingSkillDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut description: Option<String> = None;
    let mut effect: Option<SkillEffect> = None;
    let mut max_level: Option<u32> = None;
    let mut costs: Option<Vec<u64>> = None;
    let mut base_cost: Option<u64> = None;
    let mut cost_growth: Option<f64> = None;
    let mut magnitudes: Option<Vec<f32>> = None;
    let mut magnitude: Option<f32> = None;
    let mut prerequisite: Option<String> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(ctx.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <SkillDef>"),
                field,
            ));
        }

        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "label" => label = Some(ctx.required_text(field, "label")?),
            "description" => description = Some(ctx.required_text(field, "description")?),
            "effect" => {
                let tag = ctx.required_text(field, "effect")?;
                let parsed = SkillEffect::from_tag(&tag);
                if !parsed.is_recognized() {
                    warn!(
                        file = %ctx.file_path.display(),
                        effect = tag.as_str(),
                        "unrecognized_skill_effect"
                    );
                }
                effect = Some(parsed);
            }
            "maxLevel" => {
                let value = ctx.parse_number::<u32>(field, "maxLevel")?;
                if value == 0 {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "maxLevel must be >= 1".to_string(),
                        field,
                    ));
                }
                max_level = Some(value);
            }
            "costs" => {
                let values = ctx.parse_list::<u64>(field, "costs")?;
                if values.iter().any(|cost| *cost == 0) {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "costs must all be >= 1".to_string(),
                        field,
                    ));
                }
                costs = Some(values);
            }
            "baseCost" => {
                let value = ctx.parse_number::<u64>(field, "baseCost")?;
                if value == 0 {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "baseCost must be >= 1".to_string(),
                        field,
                    ));
                }
                base_cost = Some(value);
            }
            "costGrowth" => {
                let value = ctx.parse_number::<f64>(field, "costGrowth")?;
                if !value.is_finite() || value <= 0.0 {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "costGrowth must be finite and > 0".to_string(),
                        field,
                    ));
                }
                cost_growth = Some(value);
            }
            "magnitudes" => {
                let values = ctx.parse_list::<f32>(field, "magnitudes")?;
                if values.iter().any(|value| !value.is_finite()) {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "magnitudes must all be finite".to_string(),
                        field,
                    ));
                }
                magnitudes = Some(values);
            }
            "magnitude" => {
                let value = ctx.parse_number::<f32>(field, "magnitude")?;
                if !value.is_finite() {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "magnitude must be finite".to_string(),
                        field,
                    ));
                }
                magnitude = Some(value);
            }
            "prerequisite" => prerequisite = Some(ctx.required_text(field, "prerequisite")?),
            _ => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <SkillDef>"),
                    field,
                ))
            }
        }
    }

    let Some(def_name) = def_name else {
        return Err(ctx.error(
            ContentErrorCode::MissingField,
            "missing required field <defName> in <SkillDef>".to_string(),
            node,
        ));
    };
    let missing = |field_name: &str| {
        ctx.error(
            ContentErrorCode::MissingField,
            format!("missing required field <{field_name}> in <SkillDef>"),
            node,
        )
        .for_def(&def_name, field_name)
    };
    let invalid = |field_name: &str, message: String| {
        ctx.error(ContentErrorCode::InvalidValue, message, node)
            .for_def(&def_name, field_name)
    };

    let label = label.ok_or_else(|| missing("label"))?;
    let effect = effect.ok_or_else(|| missing("effect"))?;
    let max_level = max_level.unwrap_or(1);

    let cost = match (costs, base_cost) {
        (Some(_), Some(_)) => {
            return Err(invalid(
                "costs",
                "use either <costs> or <baseCost>, not both".to_string(),
            ))
        }
        (Some(costs), None) => {
            if cost_growth.is_some() {
                return Err(invalid(
                    "costGrowth",
                    "<costGrowth> only applies together with <baseCost>".to_string(),
                ));
            }
            if costs.len() != max_level as usize {
                return Err(invalid(
                    "costs",
                    format!(
                        "costs lists {} levels but maxLevel is {max_level}",
                        costs.len()
                    ),
                ));
            }
            CostCurve::Table(costs)
        }
        (None, Some(base)) => CostCurve::Geometric {
            base,
            growth: cost_growth.unwrap_or(1.0),
        },
        (None, None) => return Err(missing("costs")),
    };

    let magnitude = match (magnitudes, magnitude) {
        (Some(_), Some(_)) => {
            return Err(invalid(
                "magnitudes",
                "use either <magnitudes> or <magnitude>, not both".to_string(),
            ))
        }
        (Some(values), None) => {
            if values.len() != max_level as usize {
                return Err(invalid(
                    "magnitudes",
                    format!(
                        "magnitudes lists {} levels but maxLevel is {max_level}",
                        values.len()
                    ),
                ));
            }
            MagnitudeCurve::Table(values)
        }
        (None, Some(value)) => MagnitudeCurve::Constant(value),
        (None, None) => return Err(missing("magnitude")),
    };

    Ok(PendingSkillDef {
        def_name,
        label,
        description,
        effect,
        max_level,
        cost,
        magnitude,
        prerequisite,
    })
}

fn parse_baseline(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<BaselineStats, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut baseline = BaselineStats::default();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(ctx.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <Baseline>"),
                field,
            ));
        }

        match field_name.as_str() {
            "attackDamage" => baseline.attack_damage = ctx.non_negative(field, "attackDamage")?,
            "attackRadius" => baseline.attack_radius = ctx.non_negative(field, "attackRadius")?,
            "attackInterval" => {
                let value = ctx.non_negative(field, "attackInterval")?;
                if value < MIN_ATTACK_INTERVAL {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        format!("attackInterval must be >= {MIN_ATTACK_INTERVAL}"),
                        field,
                    ));
                }
                baseline.attack_interval = value;
            }
            "sessionDuration" => {
                baseline.session_duration = ctx.non_negative(field, "sessionDuration")?
            }
            "maxChickens" => baseline.max_chickens = ctx.parse_number(field, "maxChickens")?,
            "initialChickens" => {
                baseline.initial_chickens = ctx.parse_number(field, "initialChickens")?
            }
            "goldenEggMultiplier" => {
                baseline.golden_egg_multiplier = ctx.parse_number(field, "goldenEggMultiplier")?
            }
            "critMultiplier" => {
                baseline.crit_multiplier = ctx.non_negative(field, "critMultiplier")?
            }
            "gravityWaveTimeExtension" => {
                baseline.gravity_wave_time_extension =
                    ctx.non_negative(field, "gravityWaveTimeExtension")?
            }
            "recoveryChance" => baseline.recovery_chance = ctx.chance(field, "recoveryChance")?,
            "mitosisChance" => baseline.mitosis_chance = ctx.chance(field, "mitosisChance")?,
            "goldenSpawnRate" => baseline.golden_spawn_rate = ctx.chance(field, "goldenSpawnRate")?,
            "critChance" => baseline.crit_chance = ctx.chance(field, "critChance")?,
            "doubleProductionChance" => {
                baseline.double_production_chance = ctx.chance(field, "doubleProductionChance")?
            }
            "gravityWaveChance" => {
                baseline.gravity_wave_chance = ctx.chance(field, "gravityWaveChance")?
            }
            "mammalChance" => baseline.mammal_chance = ctx.chance(field, "mammalChance")?,
            _ => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <Baseline>"),
                    field,
                ))
            }
        }
    }
    Ok(baseline)
}

struct NodeContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl NodeContext<'_, '_> {
    fn origin(&self, node: Node<'_, '_>) -> Origin {
        Origin {
            file_path: self.file_path.to_path_buf(),
            location: Some(self.location(node)),
        }
    }

    fn location(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(self.location(node)),
            def_name: None,
            field_name: None,
        }
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self
                .error(
                    ContentErrorCode::MissingField,
                    format!("field <{field_name}> must not be empty"),
                    node,
                )
                .with_field(field_name));
        }
        Ok(value)
    }

    fn parse_number<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value.parse::<T>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is not a valid number"),
                node,
            )
            .with_field(field_name)
        })
    }

    fn parse_list<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<Vec<T>, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value
            .split(',')
            .map(str::trim)
            .map(|entry| {
                entry.parse::<T>().map_err(|_| {
                    self.error(
                        ContentErrorCode::InvalidValue,
                        format!("{field_name} entry '{entry}' is not a valid number"),
                        node,
                    )
                    .with_field(field_name)
                })
            })
            .collect()
    }

    fn non_negative(&self, node: Node<'_, '_>, field_name: &str) -> Result<f32, ContentCompileError> {
        let value = self.parse_number::<f32>(node, field_name)?;
        if !value.is_finite() || value < 0.0 {
            return Err(self
                .error(
                    ContentErrorCode::InvalidValue,
                    format!("{field_name} must be finite and >= 0"),
                    node,
                )
                .with_field(field_name));
        }
        Ok(value)
    }

    fn chance(&self, node: Node<'_, '_>, field_name: &str) -> Result<f32, ContentCompileError> {
        let value = self.non_negative(node, field_name)?;
        if value > 1.0 {
            return Err(self
                .error(
                    ContentErrorCode::InvalidValue,
                    format!("{field_name} must be within 0..=1"),
                    node,
                )
                .with_field(field_name));
        }
        Ok(value)
    }
}

impl ContentCompileError {
    fn with_field(mut self, field_name: &str) -> Self {
        self.field_name = Some(field_name.to_string());
        self
    }

    fn for_def(mut self, def_name: &str, field_name: &str) -> Self {
        self.def_name = Some(def_name.to_string());
        self.with_field(field_name)
    }
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<(String, PathBuf)>::new();
    collect_recursive(root, root, &mut files)?;
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            files.push((normalize_rel_path(rel), path.clone()));
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content: {source}"),
        file_path: path,
        location: None,
        def_name: None,
        field_name: None,
    }
}
