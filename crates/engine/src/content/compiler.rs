use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::info;

use crate::AppPaths;

use super::catalog::{CatalogBuilder, ContentCatalog};
use super::defs::{
    BehaviorActionDef, BehaviorActionId, BehaviorActionKind, BehaviorDef, BehaviorId,
    BuildingConditionSlot, ConditionDef, ConditionId, EntityTemplate, FulfillmentDef,
    InteractionActionDef, InteractionActionId, InteractionCategory, InteractionDef,
    InteractionId, InteractionKind, NeedDef, NeedId, StatRef, TargetSelection, TemplateId,
    TemplateKind,
};
use super::discovery::{collect_xml_files_sorted, discover_mod_sources};
use super::hashing::hash_content_sources;
use super::types::{ContentDiscoveryError, ContentLoadRequest};

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
    UnknownReference,
    InvalidChain,
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
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
struct DefOrigin {
    mod_id: String,
    file_path: PathBuf,
    location: Option<SourceLocation>,
}

impl DefOrigin {
    fn error(&self, code: ContentErrorCode, message: String) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.clone(),
            file_path: self.file_path.clone(),
            location: self.location,
        }
    }
}

#[derive(Debug, Clone)]
enum PendingStatRef {
    Need(String),
    Condition(String),
}

#[derive(Debug, Clone)]
struct PendingTemplate {
    def_name: String,
    label: String,
    kind: TemplateKind,
    move_speed: f32,
    conditions: Vec<(String, f32)>,
}

#[derive(Debug, Clone)]
struct PendingInteraction {
    def_name: String,
    label: String,
    kind: InteractionKind,
    category: InteractionCategory,
    target: String,
}

#[derive(Debug, Clone)]
struct PendingInteractionAction {
    def_name: String,
    interaction: String,
    duration_ticks: u64,
    next: Option<String>,
    is_root: bool,
}

#[derive(Debug, Clone)]
struct PendingFulfillment {
    def_name: String,
    interaction: String,
    target: PendingStatRef,
    increase_per_tick: f32,
}

#[derive(Debug, Clone)]
struct PendingBehavior {
    def_name: String,
    label: String,
    trigger: PendingStatRef,
    threshold: f32,
    priority: i32,
}

#[derive(Debug, Clone)]
struct PendingBehaviorAction {
    def_name: String,
    behavior: String,
    kind: BehaviorActionKind,
    target_selection: TargetSelection,
    interaction: Option<String>,
    next: Option<String>,
    is_root: bool,
    idle_duration_ticks: Option<u64>,
}

#[derive(Debug, Clone)]
enum PendingDef {
    Need(NeedDef),
    Condition(ConditionDef),
    Template(PendingTemplate),
    Interaction(PendingInteraction),
    InteractionAction(PendingInteractionAction),
    Fulfillment(PendingFulfillment),
    Behavior(PendingBehavior),
    BehaviorAction(PendingBehaviorAction),
}

impl PendingDef {
    /// Namespace for duplicate detection; all entity templates share one.
    fn namespace(&self) -> &'static str {
        match self {
            Self::Need(_) => "NeedDef",
            Self::Condition(_) => "ConditionDef",
            Self::Template(_) => "entity template",
            Self::Interaction(_) => "InteractionDef",
            Self::InteractionAction(_) => "InteractionActionDef",
            Self::Fulfillment(_) => "FulfillmentDef",
            Self::Behavior(_) => "BehaviorDef",
            Self::BehaviorAction(_) => "BehaviorActionDef",
        }
    }

    fn def_name(&self) -> &str {
        match self {
            Self::Need(def) => &def.def_name,
            Self::Condition(def) => &def.def_name,
            Self::Template(def) => &def.def_name,
            Self::Interaction(def) => &def.def_name,
            Self::InteractionAction(def) => &def.def_name,
            Self::Fulfillment(def) => &def.def_name,
            Self::Behavior(def) => &def.def_name,
            Self::BehaviorAction(def) => &def.def_name,
        }
    }
}

type Merged<T> = BTreeMap<String, (T, DefOrigin)>;

#[derive(Default)]
struct MergedDefs {
    needs: Merged<NeedDef>,
    conditions: Merged<ConditionDef>,
    templates: Merged<PendingTemplate>,
    interactions: Merged<PendingInteraction>,
    interaction_actions: Merged<PendingInteractionAction>,
    fulfillments: Merged<PendingFulfillment>,
    behaviors: Merged<PendingBehavior>,
    behavior_actions: Merged<PendingBehaviorAction>,
}

impl MergedDefs {
    // Cross-mod duplicates are intentional override points (last mod wins).
    fn insert(&mut self, def: PendingDef, origin: DefOrigin) {
        match def {
            PendingDef::Need(def) => {
                self.needs.insert(def.def_name.clone(), (def, origin));
            }
            PendingDef::Condition(def) => {
                self.conditions.insert(def.def_name.clone(), (def, origin));
            }
            PendingDef::Template(def) => {
                self.templates.insert(def.def_name.clone(), (def, origin));
            }
            PendingDef::Interaction(def) => {
                self.interactions.insert(def.def_name.clone(), (def, origin));
            }
            PendingDef::InteractionAction(def) => {
                self.interaction_actions
                    .insert(def.def_name.clone(), (def, origin));
            }
            PendingDef::Fulfillment(def) => {
                self.fulfillments.insert(def.def_name.clone(), (def, origin));
            }
            PendingDef::Behavior(def) => {
                self.behaviors.insert(def.def_name.clone(), (def, origin));
            }
            PendingDef::BehaviorAction(def) => {
                self.behavior_actions
                    .insert(def.def_name.clone(), (def, origin));
            }
        }
    }
}

/// Compiles base content plus enabled mods into a catalog with stable ids
/// (defName order per def type) and a content fingerprint.
pub fn compile_content_catalog(
    app_paths: &AppPaths,
    request: &ContentLoadRequest,
) -> Result<ContentCatalog, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut merged = MergedDefs::default();
    let mut xml_file_count = 0usize;

    for source in &sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| map_discovery_error(error, &source.source_dir))?;
        let mut seen_in_mod = HashSet::<(&'static str, String)>::new();

        for (_, xml_file) in xml_files {
            xml_file_count = xml_file_count.saturating_add(1);
            let raw = fs::read_to_string(&xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            let defs = parse_defs_document(&source.mod_id, &xml_file, &raw)?;
            for (def, origin) in defs {
                if !seen_in_mod.insert((def.namespace(), def.def_name().to_string())) {
                    return Err(origin.error(
                        ContentErrorCode::DuplicateDefInMod,
                        format!(
                            "duplicate {} '{}' in mod '{}'; each mod may define a defName only once",
                            def.namespace(),
                            def.def_name(),
                            source.mod_id
                        ),
                    ));
                }
                merged.insert(def, origin);
            }
        }
    }

    let fingerprint = hash_content_sources(&sources)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;
    let catalog = link_catalog(merged)?.with_fingerprint(fingerprint).build();

    info!(
        mods = sources.len(),
        xml_files = xml_file_count,
        behaviors = catalog.behaviors().len(),
        interactions = catalog.interactions().len(),
        fingerprint = catalog.fingerprint().unwrap_or_default(),
        "content_catalog_compiled"
    );
    Ok(catalog)
}

fn ids_by_name<T, Id>(defs: &Merged<T>, make_id: impl Fn(u32) -> Id) -> HashMap<String, Id> {
    defs.keys()
        .enumerate()
        .map(|(idx, name)| (name.clone(), make_id(idx as u32)))
        .collect()
}

fn resolve<Id: Copy>(
    ids: &HashMap<String, Id>,
    name: &str,
    what: &str,
    origin: &DefOrigin,
) -> Result<Id, ContentCompileError> {
    ids.get(name).copied().ok_or_else(|| {
        origin.error(
            ContentErrorCode::UnknownReference,
            format!("unknown {what} '{name}'"),
        )
    })
}

struct StatIds {
    needs: HashMap<String, NeedId>,
    conditions: HashMap<String, ConditionId>,
}

impl StatIds {
    fn resolve(
        &self,
        stat: &PendingStatRef,
        origin: &DefOrigin,
    ) -> Result<StatRef, ContentCompileError> {
        match stat {
            PendingStatRef::Need(name) => {
                resolve(&self.needs, name, "NeedDef", origin).map(StatRef::Need)
            }
            PendingStatRef::Condition(name) => {
                resolve(&self.conditions, name, "ConditionDef", origin).map(StatRef::Condition)
            }
        }
    }
}

/// Resolves defName references into ids and validates chain shape.
fn link_catalog(merged: MergedDefs) -> Result<CatalogBuilder, ContentCompileError> {
    let stat_ids = StatIds {
        needs: ids_by_name(&merged.needs, NeedId),
        conditions: ids_by_name(&merged.conditions, ConditionId),
    };
    let template_ids = ids_by_name(&merged.templates, TemplateId);
    let interaction_ids = ids_by_name(&merged.interactions, InteractionId);
    let interaction_action_ids = ids_by_name(&merged.interaction_actions, InteractionActionId);
    let behavior_ids = ids_by_name(&merged.behaviors, BehaviorId);
    let behavior_action_ids = ids_by_name(&merged.behavior_actions, BehaviorActionId);

    let mut builder = ContentCatalog::builder();
    for (def, _) in merged.needs.into_values() {
        builder.add_need(def);
    }
    for (def, _) in merged.conditions.into_values() {
        builder.add_condition(def);
    }
    for (def, origin) in merged.templates.into_values() {
        let mut conditions = Vec::with_capacity(def.conditions.len());
        for (name, decrease_multiplier) in &def.conditions {
            conditions.push(BuildingConditionSlot {
                condition: resolve(&stat_ids.conditions, name, "ConditionDef", &origin)?,
                decrease_multiplier: *decrease_multiplier,
            });
        }
        builder.add_template(EntityTemplate {
            id: TemplateId(0),
            def_name: def.def_name,
            label: def.label,
            kind: def.kind,
            move_speed: def.move_speed,
            conditions,
        });
    }

    let mut interaction_categories = Vec::with_capacity(merged.interactions.len());
    for (def, origin) in merged.interactions.into_values() {
        let target = resolve(&template_ids, &def.target, "entity template", &origin)?;
        interaction_categories.push(def.category);
        builder.add_interaction(InteractionDef {
            id: InteractionId(0),
            def_name: def.def_name,
            label: def.label,
            kind: def.kind,
            category: def.category,
            target,
        });
    }

    let mut roots_per_interaction = HashMap::<InteractionId, u32>::new();
    let mut interaction_of_action = Vec::with_capacity(merged.interaction_actions.len());
    let mut pending_interaction_links = Vec::new();
    for (def, origin) in merged.interaction_actions.into_values() {
        let interaction = resolve(&interaction_ids, &def.interaction, "InteractionDef", &origin)?;
        let next = def
            .next
            .as_deref()
            .map(|name| resolve(&interaction_action_ids, name, "InteractionActionDef", &origin))
            .transpose()?;
        if def.is_root {
            *roots_per_interaction.entry(interaction).or_default() += 1;
        }
        interaction_of_action.push(interaction);
        if let Some(next) = next {
            pending_interaction_links.push((interaction, next, origin.clone()));
        }
        builder.add_interaction_action(InteractionActionDef {
            id: InteractionActionId(0),
            def_name: def.def_name,
            interaction,
            duration_ticks: def.duration_ticks,
            next,
            is_root: def.is_root,
        });
    }
    for (interaction, next, origin) in pending_interaction_links {
        if interaction_of_action.get(next.0 as usize) != Some(&interaction) {
            return Err(origin.error(
                ContentErrorCode::InvalidChain,
                "<next> must point at an action of the same interaction".to_string(),
            ));
        }
    }
    for (name, id) in &interaction_ids {
        let roots = roots_per_interaction.get(id).copied().unwrap_or(0);
        if roots != 1 {
            return Err(ContentCompileError {
                code: ContentErrorCode::InvalidChain,
                message: format!("InteractionDef '{name}' must have exactly one root action, found {roots}"),
                mod_id: "<link>".to_string(),
                file_path: PathBuf::new(),
                location: None,
            });
        }
    }

    for (def, origin) in merged.fulfillments.into_values() {
        builder.add_fulfillment(FulfillmentDef {
            interaction: resolve(&interaction_ids, &def.interaction, "InteractionDef", &origin)?,
            target: stat_ids.resolve(&def.target, &origin)?,
            def_name: def.def_name,
            increase_per_tick: def.increase_per_tick,
        });
    }

    for (def, origin) in merged.behaviors.into_values() {
        builder.add_behavior(BehaviorDef {
            id: BehaviorId(0),
            trigger: stat_ids.resolve(&def.trigger, &origin)?,
            def_name: def.def_name,
            label: def.label,
            threshold: def.threshold,
            priority: def.priority,
        });
    }

    let mut roots_per_behavior = HashMap::<BehaviorId, u32>::new();
    let mut behavior_of_action = Vec::with_capacity(merged.behavior_actions.len());
    let mut pending_behavior_links = Vec::new();
    for (def, origin) in merged.behavior_actions.into_values() {
        let behavior = resolve(&behavior_ids, &def.behavior, "BehaviorDef", &origin)?;
        let interaction = def
            .interaction
            .as_deref()
            .map(|name| resolve(&interaction_ids, name, "InteractionDef", &origin))
            .transpose()?;
        let next = def
            .next
            .as_deref()
            .map(|name| resolve(&behavior_action_ids, name, "BehaviorActionDef", &origin))
            .transpose()?;
        validate_behavior_action(&def, interaction, &interaction_categories, &origin)?;
        if def.is_root {
            *roots_per_behavior.entry(behavior).or_default() += 1;
        }
        behavior_of_action.push(behavior);
        if let Some(next) = next {
            pending_behavior_links.push((behavior, next, origin.clone()));
        }
        builder.add_behavior_action(BehaviorActionDef {
            id: BehaviorActionId(0),
            def_name: def.def_name,
            behavior,
            kind: def.kind,
            target_selection: def.target_selection,
            interaction,
            next,
            is_root: def.is_root,
            idle_duration_ticks: def.idle_duration_ticks.unwrap_or(0),
        });
    }
    for (behavior, next, origin) in pending_behavior_links {
        if behavior_of_action.get(next.0 as usize) != Some(&behavior) {
            return Err(origin.error(
                ContentErrorCode::InvalidChain,
                "<next> must point at an action of the same behavior".to_string(),
            ));
        }
    }
    for (name, id) in &behavior_ids {
        let roots = roots_per_behavior.get(id).copied().unwrap_or(0);
        if roots != 1 {
            return Err(ContentCompileError {
                code: ContentErrorCode::InvalidChain,
                message: format!("BehaviorDef '{name}' must have exactly one root action, found {roots}"),
                mod_id: "<link>".to_string(),
                file_path: PathBuf::new(),
                location: None,
            });
        }
    }

    Ok(builder)
}

fn validate_behavior_action(
    def: &PendingBehaviorAction,
    interaction: Option<InteractionId>,
    interaction_categories: &[InteractionCategory],
    origin: &DefOrigin,
) -> Result<(), ContentCompileError> {
    let required = def.kind.required_category();
    if required.is_none() && interaction.is_some() {
        return Err(origin.error(
            ContentErrorCode::InvalidValue,
            "Idle actions must not reference an interaction".to_string(),
        ));
    }
    if required.is_some() && def.idle_duration_ticks.is_some() {
        return Err(origin.error(
            ContentErrorCode::InvalidValue,
            "<idleDurationTicks> is only valid on Idle actions".to_string(),
        ));
    }
    if required.is_some()
        && def.target_selection == TargetSelection::Explicit
        && interaction.is_none()
    {
        return Err(origin.error(
            ContentErrorCode::MissingField,
            "Explicit target selection requires <interaction>".to_string(),
        ));
    }
    if let (Some(required), Some(interaction)) = (required, interaction) {
        let actual = interaction_categories.get(interaction.0 as usize).copied();
        if actual != Some(required) {
            return Err(origin.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "{:?} actions need a {:?} interaction, got {:?}",
                    def.kind, required, actual
                ),
            ));
        }
    }
    Ok(())
}

struct ParseCtx<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl<'a, 'input> ParseCtx<'a, 'input> {
    fn location(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn error_at(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(self.location(node)),
        }
    }

    fn origin(&self, node: Node<'_, '_>) -> DefOrigin {
        DefOrigin {
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(self.location(node)),
        }
    }

    fn required_text(&self, node: Node<'_, '_>) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{}> must not be empty", node.tag_name().name()),
                node,
            ));
        }
        Ok(value)
    }

    fn parse_value<T: FromStr>(&self, node: Node<'_, '_>) -> Result<T, ContentCompileError> {
        let value = self.required_text(node)?;
        value.parse::<T>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} '{}' is not a valid value", node.tag_name().name(), value),
                node,
            )
        })
    }

    fn parse_non_negative(&self, node: Node<'_, '_>) -> Result<f32, ContentCompileError> {
        let parsed = self.parse_value::<f32>(node)?;
        if !parsed.is_finite() || parsed < 0.0 {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} must be finite and >= 0", node.tag_name().name()),
                node,
            ));
        }
        Ok(parsed)
    }

    fn parse_enum<T: Copy>(
        &self,
        node: Node<'_, '_>,
        allowed: &[(&str, T)],
    ) -> Result<T, ContentCompileError> {
        let value = self.required_text(node)?;
        allowed
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, parsed)| *parsed)
            .ok_or_else(|| {
                let names = allowed.iter().map(|(name, _)| *name).collect::<Vec<_>>();
                self.error_at(
                    ContentErrorCode::InvalidValue,
                    format!(
                        "invalid {} '{}'; allowed values: {}",
                        node.tag_name().name(),
                        value,
                        names.join(", ")
                    ),
                    node,
                )
            })
    }
}

/// Child elements of a def keyed by tag, rejecting duplicates and unknown tags.
struct DefFields<'a, 'input> {
    def_type: &'static str,
    node: Node<'a, 'input>,
    fields: HashMap<&'a str, Node<'a, 'input>>,
}

impl<'a, 'input> DefFields<'a, 'input> {
    fn collect(
        ctx: &ParseCtx<'_, '_>,
        def_type: &'static str,
        node: Node<'a, 'input>,
        allowed: &[&str],
    ) -> Result<Self, ContentCompileError> {
        let mut fields = HashMap::new();
        for field in node.children().filter(|child| child.is_element()) {
            let field_name = field.tag_name().name();
            if !allowed.contains(&field_name) {
                return Err(ctx.error_at(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <{def_type}>"),
                    field,
                ));
            }
            if fields.insert(field_name, field).is_some() {
                return Err(ctx.error_at(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{field_name}> in <{def_type}>"),
                    field,
                ));
            }
        }
        Ok(Self {
            def_type,
            node,
            fields,
        })
    }

    fn get(&self, name: &str) -> Option<Node<'a, 'input>> {
        self.fields.get(name).copied()
    }

    fn require(
        &self,
        ctx: &ParseCtx<'_, '_>,
        name: &str,
    ) -> Result<Node<'a, 'input>, ContentCompileError> {
        self.get(name).ok_or_else(|| {
            ctx.error_at(
                ContentErrorCode::MissingField,
                format!("missing required field <{name}> in <{}>", self.def_type),
                self.node,
            )
        })
    }

    fn text(&self, ctx: &ParseCtx<'_, '_>, name: &str) -> Result<String, ContentCompileError> {
        ctx.required_text(self.require(ctx, name)?)
    }

    fn optional_text(
        &self,
        ctx: &ParseCtx<'_, '_>,
        name: &str,
    ) -> Result<Option<String>, ContentCompileError> {
        self.get(name).map(|node| ctx.required_text(node)).transpose()
    }

    fn optional_non_negative(
        &self,
        ctx: &ParseCtx<'_, '_>,
        name: &str,
    ) -> Result<Option<f32>, ContentCompileError> {
        self.get(name)
            .map(|node| ctx.parse_non_negative(node))
            .transpose()
    }

    fn optional_bool(
        &self,
        ctx: &ParseCtx<'_, '_>,
        name: &str,
    ) -> Result<bool, ContentCompileError> {
        match self.get(name) {
            Some(node) => ctx.parse_enum(node, &[("true", true), ("false", false)]),
            None => Ok(false),
        }
    }

    /// Exactly one of `<need>` / `<condition>`.
    fn stat_ref(&self, ctx: &ParseCtx<'_, '_>) -> Result<PendingStatRef, ContentCompileError> {
        match (self.get("need"), self.get("condition")) {
            (Some(node), None) => Ok(PendingStatRef::Need(ctx.required_text(node)?)),
            (None, Some(node)) => Ok(PendingStatRef::Condition(ctx.required_text(node)?)),
            (Some(_), Some(node)) => Err(ctx.error_at(
                ContentErrorCode::InvalidValue,
                format!("<{}> takes either <need> or <condition>, not both", self.def_type),
                node,
            )),
            (None, None) => Err(ctx.error_at(
                ContentErrorCode::MissingField,
                format!("missing <need> or <condition> in <{}>", self.def_type),
                self.node,
            )),
        }
    }
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<(PendingDef, DefOrigin)>, ContentCompileError> {
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
    let ctx = ParseCtx {
        mod_id,
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        let def = match child.tag_name().name() {
            "NeedDef" => parse_stat_def(&ctx, child, "NeedDef").map(|(def_name, label, max_value, initial_value, decrease_per_tick)| {
                PendingDef::Need(NeedDef {
                    id: NeedId(0),
                    def_name,
                    label,
                    max_value,
                    initial_value,
                    decrease_per_tick,
                })
            })?,
            "ConditionDef" => parse_stat_def(&ctx, child, "ConditionDef").map(|(def_name, label, max_value, initial_value, decrease_per_tick)| {
                PendingDef::Condition(ConditionDef {
                    id: ConditionId(0),
                    def_name,
                    label,
                    max_value,
                    initial_value,
                    decrease_per_tick,
                })
            })?,
            "CharacterDef" => parse_template_def(&ctx, child, TemplateKind::Character)?,
            "BuildingDef" => parse_template_def(&ctx, child, TemplateKind::Building)?,
            "ItemDef" => parse_template_def(&ctx, child, TemplateKind::Item)?,
            "InteractionDef" => parse_interaction_def(&ctx, child)?,
            "InteractionActionDef" => parse_interaction_action_def(&ctx, child)?,
            "FulfillmentDef" => parse_fulfillment_def(&ctx, child)?,
            "BehaviorDef" => parse_behavior_def(&ctx, child)?,
            "BehaviorActionDef" => parse_behavior_action_def(&ctx, child)?,
            other => {
                return Err(ctx.error_at(
                    ContentErrorCode::UnknownDefType,
                    format!("unsupported def type <{other}>"),
                    child,
                ))
            }
        };
        defs.push((def, ctx.origin(child)));
    }

    Ok(defs)
}

/// `(defName, label, maxValue, initialValue, decreasePerTick)`; initial defaults to max.
fn parse_stat_def(
    ctx: &ParseCtx<'_, '_>,
    node: Node<'_, '_>,
    def_type: &'static str,
) -> Result<(String, String, f32, f32, f32), ContentCompileError> {
    let fields = DefFields::collect(
        ctx,
        def_type,
        node,
        &["defName", "label", "maxValue", "initialValue", "decreasePerTick"],
    )?;
    let def_name = fields.text(ctx, "defName")?;
    let label = fields.text(ctx, "label")?;
    let max_node = fields.require(ctx, "maxValue")?;
    let max_value = ctx.parse_non_negative(max_node)?;
    let initial_value = fields
        .optional_non_negative(ctx, "initialValue")?
        .unwrap_or(max_value);
    if initial_value > max_value {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidValue,
            format!("initialValue {initial_value} exceeds maxValue {max_value}"),
            node,
        ));
    }
    let decrease_per_tick = fields
        .optional_non_negative(ctx, "decreasePerTick")?
        .unwrap_or(0.0);
    Ok((def_name, label, max_value, initial_value, decrease_per_tick))
}

fn parse_template_def(
    ctx: &ParseCtx<'_, '_>,
    node: Node<'_, '_>,
    kind: TemplateKind,
) -> Result<PendingDef, ContentCompileError> {
    let (def_type, allowed): (&'static str, &[&str]) = match kind {
        TemplateKind::Character => ("CharacterDef", &["defName", "label", "moveSpeed"]),
        TemplateKind::Building => ("BuildingDef", &["defName", "label", "conditions"]),
        TemplateKind::Item => ("ItemDef", &["defName", "label"]),
    };
    let fields = DefFields::collect(ctx, def_type, node, allowed)?;

    let mut conditions = Vec::new();
    if let Some(list) = fields.get("conditions") {
        for entry in list.children().filter(|child| child.is_element()) {
            if entry.tag_name().name() != "li" {
                return Err(ctx.error_at(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{}> in <conditions>", entry.tag_name().name()),
                    entry,
                ));
            }
            let slot = DefFields::collect(ctx, "li", entry, &["condition", "decreaseMultiplier"])?;
            conditions.push((
                slot.text(ctx, "condition")?,
                slot.optional_non_negative(ctx, "decreaseMultiplier")?
                    .unwrap_or(1.0),
            ));
        }
    }

    Ok(PendingDef::Template(PendingTemplate {
        def_name: fields.text(ctx, "defName")?,
        label: fields.text(ctx, "label")?,
        kind,
        move_speed: fields
            .optional_non_negative(ctx, "moveSpeed")?
            .unwrap_or(EntityTemplate::DEFAULT_MOVE_SPEED),
        conditions,
    }))
}

fn parse_interaction_def(
    ctx: &ParseCtx<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingDef, ContentCompileError> {
    let fields = DefFields::collect(
        ctx,
        "InteractionDef",
        node,
        &["defName", "label", "kind", "category", "target"],
    )?;
    Ok(PendingDef::Interaction(PendingInteraction {
        def_name: fields.text(ctx, "defName")?,
        label: fields.text(ctx, "label")?,
        kind: ctx.parse_enum(
            fields.require(ctx, "kind")?,
            &[
                ("Building", InteractionKind::Building),
                ("Item", InteractionKind::Item),
                ("Character", InteractionKind::Character),
            ],
        )?,
        category: ctx.parse_enum(
            fields.require(ctx, "category")?,
            &[
                ("Once", InteractionCategory::Once),
                ("System", InteractionCategory::System),
                ("Repeat", InteractionCategory::Repeat),
            ],
        )?,
        target: fields.text(ctx, "target")?,
    }))
}

fn parse_interaction_action_def(
    ctx: &ParseCtx<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingDef, ContentCompileError> {
    let fields = DefFields::collect(
        ctx,
        "InteractionActionDef",
        node,
        &["defName", "interaction", "durationTicks", "next", "root"],
    )?;
    Ok(PendingDef::InteractionAction(PendingInteractionAction {
        def_name: fields.text(ctx, "defName")?,
        interaction: fields.text(ctx, "interaction")?,
        duration_ticks: ctx.parse_value(fields.require(ctx, "durationTicks")?)?,
        next: fields.optional_text(ctx, "next")?,
        is_root: fields.optional_bool(ctx, "root")?,
    }))
}

fn parse_fulfillment_def(
    ctx: &ParseCtx<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingDef, ContentCompileError> {
    let fields = DefFields::collect(
        ctx,
        "FulfillmentDef",
        node,
        &["defName", "interaction", "need", "condition", "increasePerTick"],
    )?;
    Ok(PendingDef::Fulfillment(PendingFulfillment {
        def_name: fields.text(ctx, "defName")?,
        interaction: fields.text(ctx, "interaction")?,
        target: fields.stat_ref(ctx)?,
        increase_per_tick: ctx.parse_non_negative(fields.require(ctx, "increasePerTick")?)?,
    }))
}

fn parse_behavior_def(
    ctx: &ParseCtx<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingDef, ContentCompileError> {
    let fields = DefFields::collect(
        ctx,
        "BehaviorDef",
        node,
        &["defName", "label", "need", "condition", "threshold", "priority"],
    )?;
    Ok(PendingDef::Behavior(PendingBehavior {
        def_name: fields.text(ctx, "defName")?,
        label: fields.text(ctx, "label")?,
        trigger: fields.stat_ref(ctx)?,
        threshold: ctx.parse_non_negative(fields.require(ctx, "threshold")?)?,
        priority: ctx.parse_value(fields.require(ctx, "priority")?)?,
    }))
}

fn parse_behavior_action_def(
    ctx: &ParseCtx<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingDef, ContentCompileError> {
    let fields = DefFields::collect(
        ctx,
        "BehaviorActionDef",
        node,
        &[
            "defName",
            "behavior",
            "type",
            "targetSelection",
            "interaction",
            "next",
            "root",
            "idleDurationTicks",
        ],
    )?;
    let target_selection = match fields.get("targetSelection") {
        Some(field) => ctx.parse_enum(
            field,
            &[
                ("Explicit", TargetSelection::Explicit),
                ("Search", TargetSelection::Search),
                ("SearchOrContinue", TargetSelection::SearchOrContinue),
            ],
        )?,
        None => TargetSelection::Explicit,
    };
    Ok(PendingDef::BehaviorAction(PendingBehaviorAction {
        def_name: fields.text(ctx, "defName")?,
        behavior: fields.text(ctx, "behavior")?,
        kind: ctx.parse_enum(
            fields.require(ctx, "type")?,
            &[
                ("Idle", BehaviorActionKind::Idle),
                ("SystemItemPick", BehaviorActionKind::SystemItemPick),
                ("Once", BehaviorActionKind::Once),
                ("Fulfill", BehaviorActionKind::Fulfill),
            ],
        )?,
        target_selection,
        interaction: fields.optional_text(ctx, "interaction")?,
        next: fields.optional_text(ctx, "next")?,
        is_root: fields.optional_bool(ctx, "root")?,
        idle_duration_ticks: fields
            .get("idleDurationTicks")
            .map(|field| ctx.parse_value(field))
            .transpose()?,
    }))
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentDiscoveryError, root: &Path) -> ContentCompileError {
    match error {
        ContentDiscoveryError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check enabled mod list",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        ContentDiscoveryError::ReadFile { path, source } => ContentCompileError {
            code: ContentErrorCode::ReadFile,
            message: format!("failed to read content file: {source}"),
            mod_id: "<fingerprint>".to_string(),
            file_path: path,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: root.to_path_buf(),
            location: None,
        },
    }
}
