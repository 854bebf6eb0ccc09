//! The textual IR format (§6): a line-oriented, whitespace-delimited
//! writer and a two-phase forward-reference reader.
//!
//! Grammar (§6):
//!
//! ```text
//! modes { (int|ref|float|bool|control|memory|tuple|internal) NAME ... }
//! typegraph { (type TYPENR KIND ...)* (entity ENR NAME TYPENR KIND ...)* }
//! irg ENTITY_REF FRAME_TYPE INLINE_PROP ADDITIONAL_PROPS { <node>* }
//! constirg NODEREF { <node>* }
//! program { (segment_type SEG TYPE)* (asm "TEXT")* }
//! ```
//!
//! A node line is `KIND NODENR MODE BLOCKREF ATTR* [ NODENR* ]`. Phi,
//! Block and Anchor predecessors may reference node numbers not yet
//! defined earlier in the file; the reader resolves them in a second
//! pass once every node has been created (§9: "model as a two-phase
//! parse — phase 1 creates nodes with placeholder predecessor lists,
//! phase 2 resolves lists").
//!
//! Writing preserves node numbering exactly: every graph begins life
//! with the same ten anchors allocated in the same order by
//! [`crate::graph::Graph::new`], so a node's arena index is stable and
//! reproducible across a write/read round-trip without needing a
//! separate renumbering table.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

use itertools::Itertools;

use firm_asm::{
    Builtin, BuiltinAttr, CallAttr, CmpAttr, ConfirmAttr, ConstAttr, Op, ProjAttr, SwitchAttr,
    SwitchEntry, SymConstAttr,
};
use firm_types::{Mode, Relation, Signedness, Tarval};

use crate::error::{Error, Result};
use crate::graph::{Attr, Graph, NodeId};
use crate::ty::{
    CallingConvention, Entity, EntityId, EntityKind, Field, MethodType, Type, TypeId, TypeTable,
};

const INPUT_FILE: &str = "<input>";

// ---------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------

/// Renders `graph` (and the entity/type information `types` holds about
/// it) as textual IR.
pub fn write_graph(graph: &Graph, types: &TypeTable) -> String {
    let mut out = String::new();
    write_modes_section(&mut out, graph);
    write_typegraph_section(&mut out, types);
    write_irg_section(&mut out, graph);
    let _ = writeln!(out, "constirg NULL {{\n}}");
    let _ = writeln!(out, "program {{\n}}");
    out
}

fn write_modes_section(out: &mut String, graph: &Graph) {
    let modes: Vec<Mode> = graph
        .node_ids()
        .map(|id| graph.node(id).mode().clone())
        .unique_by(|mode| mode.name().to_string())
        .sorted_by_key(|mode| mode.name().to_string())
        .collect();

    let _ = writeln!(out, "modes {{");
    for mode in &modes {
        write_mode_line(out, mode);
    }
    let _ = writeln!(out, "}}");
}

fn write_mode_line(out: &mut String, mode: &Mode) {
    use firm_types::ModeSort::*;
    match mode.sort() {
        Int => {
            let signed = match mode.signedness() {
                Some(Signedness::Signed) => "signed",
                _ => "unsigned",
            };
            let _ = writeln!(
                out,
                "  int {} {} {} {}",
                mode.name(),
                signed,
                mode.bits(),
                mode.modulo_shift()
            );
        }
        Reference => {
            let _ = writeln!(out, "  ref {} {}", mode.name(), mode.bits());
        }
        Float => {
            let layout = mode.float_layout().unwrap_or(firm_types::FloatLayout {
                exponent_bits: 0,
                mantissa_bits: 0,
            });
            let _ = writeln!(
                out,
                "  float {} {} {} {}",
                mode.name(),
                mode.bits(),
                layout.exponent_bits,
                layout.mantissa_bits
            );
        }
        Boolean => {
            let _ = writeln!(out, "  bool {}", mode.name());
        }
        Control => {
            let _ = writeln!(out, "  control {}", mode.name());
        }
        Memory => {
            let _ = writeln!(out, "  memory {}", mode.name());
        }
        Tuple => {
            let _ = writeln!(out, "  tuple {}", mode.name());
        }
        Internal => {
            let _ = writeln!(out, "  internal {}", mode.name());
        }
    }
}

fn write_typegraph_section(out: &mut String, types: &TypeTable) {
    let _ = writeln!(out, "typegraph {{");
    for (idx, ty) in types.types_iter() {
        write_type_line(out, idx, ty);
    }
    for (idx, entity) in types.entities_iter() {
        write_entity_line(out, idx, entity);
    }
    let _ = writeln!(out, "}}");
}

fn write_type_line(out: &mut String, idx: TypeId, ty: &Type) {
    match ty {
        Type::Primitive(mode) => {
            let _ = writeln!(out, "  type {} primitive {}", idx.index(), mode.name());
        }
        Type::Pointer { pointee } => {
            let _ = writeln!(out, "  type {} pointer {}", idx.index(), pointee.index());
        }
        Type::Array { element, length } => {
            let _ = writeln!(out, "  type {} array {} {}", idx.index(), element.index(), length);
        }
        Type::Struct { name, fields } => write_fields_line(out, idx, "struct", name, fields),
        Type::Class { name, fields } => write_fields_line(out, idx, "class", name, fields),
        Type::Union { name, members } => write_fields_line(out, idx, "union", name, members),
        Type::Method(method) => {
            let cc = match method.calling_convention {
                CallingConvention::Default => "default",
                CallingConvention::C => "c",
                CallingConvention::Fast => "fast",
            };
            let params = join_type_ids(&method.params);
            let results = join_type_ids(&method.results);
            let _ = writeln!(
                out,
                "  type {} method {} {} {}|{}",
                idx.index(),
                cc,
                method.variadic,
                params,
                results
            );
        }
        Type::Enumeration {
            name,
            underlying,
            variants,
        } => {
            let variants = variants
                .iter()
                .map(|(name, value)| format!("{name}:{value}"))
                .collect::<Vec<_>>()
                .join(",");
            let variants = if variants.is_empty() { "-".to_string() } else { variants };
            let _ = writeln!(
                out,
                "  type {} enum {} {} {}",
                idx.index(),
                name,
                underlying.index(),
                variants
            );
        }
    }
}

fn write_fields_line(out: &mut String, idx: TypeId, kind: &str, name: &str, fields: &[Field]) {
    let fields = fields
        .iter()
        .map(|f| format!("{}:{}:{}", f.name, f.ty.index(), f.offset))
        .collect::<Vec<_>>()
        .join(",");
    let fields = if fields.is_empty() { "-".to_string() } else { fields };
    let _ = writeln!(out, "  type {} {} {} {}", idx.index(), kind, name, fields);
}

fn join_type_ids(ids: &[TypeId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter().map(|t| t.index().to_string()).collect::<Vec<_>>().join(",")
}

fn write_entity_line(out: &mut String, idx: EntityId, entity: &Entity) {
    match &entity.kind {
        EntityKind::Method { lowered_type } => {
            let lowered = lowered_type.map(|t| t.index().to_string()).unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  entity {} {} {} method {}",
                idx.as_ref().0,
                entity.name,
                entity.ty.index(),
                lowered
            );
        }
        EntityKind::Global => {
            let _ = writeln!(out, "  entity {} {} {} global", idx.as_ref().0, entity.name, entity.ty.index());
        }
        EntityKind::Field => {
            let _ = writeln!(out, "  entity {} {} {} field", idx.as_ref().0, entity.name, entity.ty.index());
        }
        EntityKind::Parameter { number, low_half_mode } => {
            let mode = low_half_mode.as_ref().map(|m| m.name().to_string()).unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  entity {} {} {} parameter {} {}",
                idx.as_ref().0,
                entity.name,
                entity.ty.index(),
                number,
                mode
            );
        }
    }
}

fn write_irg_section(out: &mut String, graph: &Graph) {
    let _ = writeln!(
        out,
        "irg {} {} none - {{",
        graph.entity().as_ref().0,
        graph.frame_type().as_ref().0
    );
    for id in graph.node_ids() {
        write_node_line(out, graph, id);
    }
    let _ = writeln!(out, "}}");
}

fn write_node_line(out: &mut String, graph: &Graph, id: NodeId) {
    let node = graph.node(id);
    let block = match node.block() {
        Some(b) => format!("b{}", b.index()),
        None => "-".to_string(),
    };
    let attrs = encode_attrs(node.attr());
    let preds = node
        .inputs()
        .iter()
        .map(|n| n.index().to_string())
        .collect::<Vec<_>>()
        .join(" ");

    let _ = write!(
        out,
        "  {} {} {} {}",
        node.op(),
        id.index(),
        node.mode().name(),
        block
    );
    if !attrs.is_empty() {
        let _ = write!(out, " {}", attrs.join(" "));
    }
    let _ = writeln!(out, " [ {preds} ]");
}

fn encode_attrs(attr: &Attr) -> Vec<String> {
    match attr {
        Attr::None => Vec::new(),
        Attr::Const(ConstAttr { value }) => vec![format!("value={}", value.to_decimal().unwrap_or_else(|_| "bad".into()))],
        Attr::SymConst(SymConstAttr { entity }) => vec![format!("entity={}", entity.0)],
        Attr::Proj(ProjAttr { num }) => vec![format!("num={num}")],
        Attr::Cmp(CmpAttr { relation }) => vec![format!("rel={}", relation.bits())],
        Attr::Confirm(ConfirmAttr { relation }) => vec![format!("rel={}", relation.bits())],
        Attr::Switch(SwitchAttr { table, n_outs }) => {
            let table = table
                .iter()
                .map(|e| format!("{}:{}:{}", e.pn, e.min, e.max))
                .collect::<Vec<_>>()
                .join(",");
            let table = if table.is_empty() { "-".to_string() } else { table };
            vec![format!("nouts={n_outs}"), format!("table={table}")]
        }
        Attr::Call(CallAttr { method_type }) => vec![format!("method={}", method_type.0)],
        Attr::Builtin(BuiltinAttr { kind }) => vec![format!("kind={kind}")],
    }
}

// ---------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------

/// The result of reading a textual IR document: the reconstructed
/// graph plus every recoverable parse error encountered along the way
/// (§7: "the reader continues best-effort and returns a nonzero count
/// at end").
pub struct ReadOutcome {
    /// The reconstructed graph.
    pub graph: Graph,
    /// Parse errors recovered from by skipping the offending line.
    pub errors: Vec<Error>,
}

struct ParsedNode {
    nodenr: u32,
    op: Op,
    mode_name: String,
    block: Option<u32>,
    attrs: HashMap<String, String>,
    preds: Vec<u32>,
}

/// Parses `input` and reconstructs the graph its `irg` section
/// describes, registering any types/entities its `typegraph` section
/// names into `types`.
pub fn read_graph(input: &str, types: &mut TypeTable) -> Result<ReadOutcome> {
    let mut errors = Vec::new();
    let modes = read_modes_section(input, &mut errors)?;
    read_typegraph_section(input, types, &modes, &mut errors);
    let (entity, frame_type, nodes) = read_irg_section(input, &mut errors)?;

    let mut graph = Graph::new(entity, frame_type);
    let base = graph.node_count() as u32;

    let mut id_of: HashMap<u32, NodeId> = HashMap::new();
    for id in graph.node_ids() {
        id_of.insert(id.index() as u32, id);
    }

    // Phase 1: create every node beyond the anchors, with placeholder
    // (empty) inputs; anchors already exist from `Graph::new`.
    for parsed in &nodes {
        if parsed.nodenr < base {
            continue;
        }
        let Some(mode) = modes.get(&parsed.mode_name).cloned() else {
            errors.push(parse_error(parsed.nodenr, format!("unknown mode {}", parsed.mode_name)));
            continue;
        };
        let attr = decode_attrs(parsed, &mode, &mut errors);
        let placeholder_count = parsed.preds.len();
        let placeholder = graph.anchors().bad;
        let id = graph.add_node(parsed.op, mode, None, vec![placeholder; placeholder_count], attr);
        id_of.insert(parsed.nodenr, id);
    }

    // Phase 2: resolve block references and predecessor lists now that
    // every node number in the file maps to a real node.
    for parsed in &nodes {
        if parsed.nodenr < base {
            continue;
        }
        let Some(&id) = id_of.get(&parsed.nodenr) else { continue };
        if let Some(block_nr) = parsed.block {
            match id_of.get(&block_nr) {
                Some(&block_id) => graph.set_block_unchecked(id, block_id),
                None => errors.push(parse_error(parsed.nodenr, format!("undefined block reference {block_nr}"))),
            }
        }
        for (pos, &pred_nr) in parsed.preds.iter().enumerate() {
            match id_of.get(&pred_nr) {
                Some(&pred_id) => {
                    let _ = graph.set_input(id, pos as i32, pred_id);
                }
                None => {
                    errors.push(parse_error(parsed.nodenr, format!("undefined predecessor reference {pred_nr}")));
                    // §7 recovery: materialize Bad as a placeholder.
                    let bad = graph.anchors().bad;
                    let _ = graph.set_input(id, pos as i32, bad);
                }
            }
        }
    }

    Ok(ReadOutcome { graph, errors })
}

fn parse_error(nodenr: u32, message: String) -> Error {
    Error::Parse {
        file: INPUT_FILE.to_string(),
        line: nodenr,
        message,
    }
}

/// Finds the byte offset of the start of the first line whose trimmed
/// content begins with `keyword` (followed by whitespace or `{`) —
/// avoids false matches on keywords that are substrings of other
/// keywords (e.g. `"irg"` inside `"constirg"`).
fn find_header_line(input: &str, keyword: &str) -> Option<usize> {
    let mut offset = 0;
    for line in input.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let rest = trimmed.strip_prefix(keyword);
        let matches = matches!(rest, Some(r) if r.starts_with(|c: char| c.is_whitespace() || c == '{'));
        if matches {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

fn section_body(input: &str, header_prefix: &str) -> Option<&str> {
    let start = find_header_line(input, header_prefix)?;
    let after = &input[start..];
    let open = after.find('{')?;
    let mut depth = 0usize;
    let bytes = after.as_bytes();
    let mut end = None;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    Some(&after[open + 1..end])
}

fn read_modes_section(input: &str, errors: &mut Vec<Error>) -> Result<HashMap<String, Mode>> {
    let mut modes = HashMap::new();
    let Some(body) = section_body(input, "modes") else {
        return Ok(modes);
    };
    for (lineno, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let result = parse_mode_line(&tokens);
        match result {
            Ok((name, mode)) => {
                modes.insert(name, mode);
            }
            Err(message) => errors.push(parse_error(lineno as u32, message)),
        }
    }
    Ok(modes)
}

fn parse_mode_line(tokens: &[&str]) -> std::result::Result<(String, Mode), String> {
    let [kind, rest @ ..] = tokens else {
        return Err("empty mode line".to_string());
    };
    match *kind {
        "int" => {
            let [name, signed, bits, modulo] = rest else {
                return Err("malformed int mode line".to_string());
            };
            let signedness = if *signed == "signed" { Signedness::Signed } else { Signedness::Unsigned };
            let bits: u32 = bits.parse().map_err(|_| "bad bit width".to_string())?;
            let modulo: u32 = modulo.parse().map_err(|_| "bad modulo-shift".to_string())?;
            let mode = Mode::new_int(name.to_string(), bits, signedness, modulo).map_err(|e| e.to_string())?;
            Ok((name.to_string(), mode))
        }
        "ref" => {
            let [name, bits] = rest else {
                return Err("malformed ref mode line".to_string());
            };
            let bits: u32 = bits.parse().map_err(|_| "bad bit width".to_string())?;
            Ok((name.to_string(), Mode::new_reference(name.to_string(), bits)))
        }
        "float" => {
            let [name, bits, exp, mant] = rest else {
                return Err("malformed float mode line".to_string());
            };
            let bits: u32 = bits.parse().map_err(|_| "bad bit width".to_string())?;
            let exp: u32 = exp.parse().map_err(|_| "bad exponent width".to_string())?;
            let mant: u32 = mant.parse().map_err(|_| "bad mantissa width".to_string())?;
            let mode = Mode::new_float(name.to_string(), bits, exp, mant).map_err(|e| e.to_string())?;
            Ok((name.to_string(), mode))
        }
        "bool" => {
            let [name] = rest else { return Err("malformed bool mode line".to_string()) };
            Ok((name.to_string(), Mode::boolean()))
        }
        "control" => {
            let [name] = rest else { return Err("malformed control mode line".to_string()) };
            Ok((name.to_string(), Mode::control()))
        }
        "memory" => {
            let [name] = rest else { return Err("malformed memory mode line".to_string()) };
            Ok((name.to_string(), Mode::memory()))
        }
        "tuple" => {
            let [name] = rest else { return Err("malformed tuple mode line".to_string()) };
            Ok((name.to_string(), Mode::tuple()))
        }
        "internal" => {
            let [name] = rest else { return Err("malformed internal mode line".to_string()) };
            Ok((name.to_string(), Mode::internal(name.to_string())))
        }
        other => Err(format!("unknown mode kind {other}")),
    }
}

fn read_typegraph_section(
    input: &str,
    types: &mut TypeTable,
    modes: &HashMap<String, Mode>,
    errors: &mut Vec<Error>,
) {
    let Some(body) = section_body(input, "typegraph") else {
        return;
    };
    let mut type_ids: HashMap<u32, TypeId> = HashMap::new();
    // Two passes: types first (they may reference each other only by
    // already-assigned lower-numbered ids in this writer's output), then
    // entities (which reference types).
    for (lineno, line) in body.lines().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("type ") {
            match parse_type_line(rest, &type_ids, modes) {
                Ok((raw, ty)) => {
                    let id = types.add_type(ty);
                    type_ids.insert(raw, id);
                }
                Err(message) => errors.push(parse_error(lineno as u32, message)),
            }
        }
    }
    for (lineno, line) in body.lines().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("entity ") {
            if let Err(message) = parse_entity_line(rest, types, &type_ids, modes) {
                errors.push(parse_error(lineno as u32, message));
            }
        }
    }
}

fn lookup_type(ids: &HashMap<u32, TypeId>, raw: &str) -> std::result::Result<TypeId, String> {
    let raw: u32 = raw.parse().map_err(|_| format!("bad type reference {raw}"))?;
    ids.get(&raw).copied().ok_or_else(|| format!("undefined type {raw}"))
}

fn parse_type_id_list(s: &str, ids: &HashMap<u32, TypeId>) -> std::result::Result<Vec<TypeId>, String> {
    if s == "-" {
        return Ok(Vec::new());
    }
    s.split(',').map(|t| lookup_type(ids, t)).collect()
}

fn parse_type_line(
    rest: &str,
    ids: &HashMap<u32, TypeId>,
    modes: &HashMap<String, Mode>,
) -> std::result::Result<(u32, Type), String> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let [raw, kind, body @ ..] = tokens.as_slice() else {
        return Err("malformed type line".to_string());
    };
    let raw: u32 = raw.parse().map_err(|_| "bad type number".to_string())?;
    let ty = match *kind {
        "primitive" => {
            let [mode_name] = body else { return Err("malformed primitive type".to_string()) };
            let mode = modes.get(*mode_name).cloned().ok_or_else(|| format!("unknown mode {mode_name}"))?;
            Type::Primitive(mode)
        }
        "pointer" => {
            let [pointee] = body else { return Err("malformed pointer type".to_string()) };
            Type::Pointer { pointee: lookup_type(ids, pointee)? }
        }
        "array" => {
            let [element, length] = body else { return Err("malformed array type".to_string()) };
            let length: u32 = length.parse().map_err(|_| "bad array length".to_string())?;
            Type::Array { element: lookup_type(ids, element)?, length }
        }
        "struct" | "class" | "union" => {
            let [name, fields] = body else { return Err("malformed aggregate type".to_string()) };
            let fields = parse_fields(fields, ids)?;
            match *kind {
                "struct" => Type::Struct { name: name.to_string(), fields },
                "class" => Type::Class { name: name.to_string(), fields },
                _ => Type::Union { name: name.to_string(), members: fields },
            }
        }
        "method" => {
            let [cc, variadic, lists] = body else { return Err("malformed method type".to_string()) };
            let calling_convention = match *cc {
                "c" => CallingConvention::C,
                "fast" => CallingConvention::Fast,
                _ => CallingConvention::Default,
            };
            let variadic: bool = variadic.parse().map_err(|_| "bad variadic flag".to_string())?;
            let (params, results) = lists.split_once('|').ok_or_else(|| "malformed method param/result lists".to_string())?;
            Type::Method(MethodType {
                params: parse_type_id_list(params, ids)?,
                results: parse_type_id_list(results, ids)?,
                calling_convention,
                variadic,
            })
        }
        "enum" => {
            let [name, underlying, variants] = body else { return Err("malformed enum type".to_string()) };
            let underlying = lookup_type(ids, underlying)?;
            let variants = if *variants == "-" {
                Vec::new()
            } else {
                variants
                    .split(',')
                    .map(|v| {
                        let (name, value) = v.split_once(':').ok_or_else(|| format!("malformed enum variant {v}"))?;
                        let value: i128 = value.parse().map_err(|_| format!("bad enum variant value {v}"))?;
                        Ok((name.to_string(), value))
                    })
                    .collect::<std::result::Result<Vec<_>, String>>()?
            };
            Type::Enumeration { name: name.to_string(), underlying, variants }
        }
        other => return Err(format!("unknown type kind {other}")),
    };
    Ok((raw, ty))
}

fn parse_fields(s: &str, ids: &HashMap<u32, TypeId>) -> std::result::Result<Vec<Field>, String> {
    if s == "-" {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|f| {
            let mut parts = f.splitn(3, ':');
            let name = parts.next().ok_or_else(|| format!("malformed field {f}"))?;
            let ty = parts.next().ok_or_else(|| format!("malformed field {f}"))?;
            let offset = parts.next().ok_or_else(|| format!("malformed field {f}"))?;
            let offset: u32 = offset.parse().map_err(|_| format!("bad field offset {f}"))?;
            Ok(Field { name: name.to_string(), ty: lookup_type(ids, ty)?, offset })
        })
        .collect()
}

fn parse_entity_line(
    rest: &str,
    types: &mut TypeTable,
    ids: &HashMap<u32, TypeId>,
    modes: &HashMap<String, Mode>,
) -> std::result::Result<(), String> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let [_raw, name, ty, kind, body @ ..] = tokens.as_slice() else {
        return Err("malformed entity line".to_string());
    };
    let ty = lookup_type(ids, ty)?;
    let kind = match *kind {
        "method" => {
            let [lowered] = body else { return Err("malformed method entity".to_string()) };
            let lowered_type = if *lowered == "-" { None } else { Some(lookup_type(ids, lowered)?) };
            EntityKind::Method { lowered_type }
        }
        "global" => EntityKind::Global,
        "field" => EntityKind::Field,
        "parameter" => {
            let [number, mode_name] = body else { return Err("malformed parameter entity".to_string()) };
            let number: u32 = number.parse().map_err(|_| "bad parameter number".to_string())?;
            let low_half_mode = if *mode_name == "-" {
                None
            } else {
                Some(modes.get(*mode_name).cloned().ok_or_else(|| format!("unknown mode {mode_name}"))?)
            };
            EntityKind::Parameter { number, low_half_mode }
        }
        other => return Err(format!("unknown entity kind {other}")),
    };
    types.add_entity(Entity { name: name.to_string(), ty, kind });
    Ok(())
}

fn read_irg_section(input: &str, errors: &mut Vec<Error>) -> Result<(EntityId, EntityId, Vec<ParsedNode>)> {
    let header_idx = find_header_line(input, "irg").ok_or_else(|| Error::Parse {
        file: INPUT_FILE.to_string(),
        line: 0,
        message: "missing irg section".to_string(),
    })?;
    let header_line = input[header_idx..].lines().next().unwrap_or("");
    let header_tokens: Vec<&str> = header_line.split_whitespace().collect();
    let entity_raw: u32 = header_tokens.get(1).and_then(|s| s.parse().ok()).ok_or_else(|| Error::Parse {
        file: INPUT_FILE.to_string(),
        line: 0,
        message: "malformed irg header".to_string(),
    })?;
    let frame_raw: u32 = header_tokens.get(2).and_then(|s| s.parse().ok()).ok_or_else(|| Error::Parse {
        file: INPUT_FILE.to_string(),
        line: 0,
        message: "malformed irg header".to_string(),
    })?;

    let body = section_body(&input[header_idx..], "irg").ok_or_else(|| Error::Parse {
        file: INPUT_FILE.to_string(),
        line: 0,
        message: "irg section has no body".to_string(),
    })?;

    let mut nodes = Vec::new();
    for (lineno, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_node_line(line) {
            Ok(node) => nodes.push(node),
            Err(message) => errors.push(parse_error(lineno as u32, message)),
        }
    }
    Ok((EntityId::from_ref(firm_asm::EntityRef(entity_raw)), EntityId::from_ref(firm_asm::EntityRef(frame_raw)), nodes))
}

fn parse_node_line(line: &str) -> std::result::Result<ParsedNode, String> {
    let open = line.find('[').ok_or_else(|| "node line missing predecessor list".to_string())?;
    let close = line.rfind(']').ok_or_else(|| "node line missing closing bracket".to_string())?;
    let head = &line[..open];
    let pred_body = &line[open + 1..close];

    let head_tokens: Vec<&str> = head.split_whitespace().collect();
    let [kind, nodenr, mode_name, block_tok, attr_tokens @ ..] = head_tokens.as_slice() else {
        return Err("malformed node line head".to_string());
    };
    let op = Op::from_str(kind).map_err(|_| format!("unknown opcode {kind}"))?;
    let nodenr: u32 = nodenr.parse().map_err(|_| "bad node number".to_string())?;
    let block = if *block_tok == "-" {
        None
    } else {
        Some(
            block_tok
                .strip_prefix('b')
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| format!("malformed block reference {block_tok}"))?,
        )
    };
    let mut attrs = HashMap::new();
    for tok in attr_tokens {
        if let Some((key, value)) = tok.split_once('=') {
            attrs.insert(key.to_string(), value.to_string());
        }
    }
    let preds = pred_body
        .split_whitespace()
        .map(|t| t.parse().map_err(|_| format!("bad predecessor reference {t}")))
        .collect::<std::result::Result<Vec<u32>, String>>()?;

    Ok(ParsedNode {
        nodenr,
        op,
        mode_name: mode_name.to_string(),
        block,
        attrs,
        preds,
    })
}

fn decode_attrs(parsed: &ParsedNode, mode: &Mode, errors: &mut Vec<Error>) -> Attr {
    let get = |key: &str| parsed.attrs.get(key).map(String::as_str);
    match parsed.op {
        Op::Const => match get("value") {
            Some("bad") => Attr::Const(ConstAttr { value: Tarval::bad() }),
            Some(text) => match Tarval::from_decimal(mode, text) {
                Ok(value) => Attr::Const(ConstAttr { value }),
                Err(e) => {
                    errors.push(parse_error(parsed.nodenr, e.to_string()));
                    Attr::Const(ConstAttr { value: Tarval::bad() })
                }
            },
            None => {
                errors.push(parse_error(parsed.nodenr, "missing value= attribute".to_string()));
                Attr::None
            }
        },
        Op::SymConst => match get("entity").and_then(|v| v.parse().ok()) {
            Some(raw) => Attr::SymConst(SymConstAttr { entity: firm_asm::EntityRef(raw) }),
            None => {
                errors.push(parse_error(parsed.nodenr, "missing entity= attribute".to_string()));
                Attr::None
            }
        },
        Op::Proj => match get("num").and_then(|v| v.parse().ok()) {
            Some(num) => Attr::Proj(ProjAttr { num }),
            None => {
                errors.push(parse_error(parsed.nodenr, "missing num= attribute".to_string()));
                Attr::None
            }
        },
        Op::Cmp => decode_relation_attr(parsed, errors).map(|relation| Attr::Cmp(CmpAttr { relation })).unwrap_or(Attr::None),
        Op::Confirm => decode_relation_attr(parsed, errors).map(|relation| Attr::Confirm(ConfirmAttr { relation })).unwrap_or(Attr::None),
        Op::Switch => {
            let n_outs = get("nouts").and_then(|v| v.parse().ok()).unwrap_or(0);
            let table = get("table")
                .map(|s| {
                    if s == "-" {
                        Vec::new()
                    } else {
                        s.split(',')
                            .filter_map(|e| {
                                let mut parts = e.splitn(3, ':');
                                let pn = parts.next()?.parse().ok()?;
                                let min = parts.next()?.parse().ok()?;
                                let max = parts.next()?.parse().ok()?;
                                Some(SwitchEntry { pn, min, max })
                            })
                            .collect()
                    }
                })
                .unwrap_or_default();
            Attr::Switch(SwitchAttr { table, n_outs })
        }
        Op::Call => match get("method").and_then(|v| v.parse().ok()) {
            Some(raw) => Attr::Call(CallAttr { method_type: firm_asm::EntityRef(raw) }),
            None => {
                errors.push(parse_error(parsed.nodenr, "missing method= attribute".to_string()));
                Attr::None
            }
        },
        Op::Builtin => match get("kind").and_then(|v| Builtin::from_str(v).ok()) {
            Some(kind) => Attr::Builtin(BuiltinAttr { kind }),
            None => {
                errors.push(parse_error(parsed.nodenr, "missing or unknown kind= attribute".to_string()));
                Attr::None
            }
        },
        _ => Attr::None,
    }
}

fn decode_relation_attr(parsed: &ParsedNode, errors: &mut Vec<Error>) -> Option<Relation> {
    match parsed.attrs.get("rel").and_then(|v| v.parse::<u8>().ok()) {
        Some(bits) => match Relation::from_bits_checked(bits) {
            Ok(rel) => Some(rel),
            Err(e) => {
                errors.push(parse_error(parsed.nodenr, e.to_string()));
                None
            }
        },
        None => {
            errors.push(parse_error(parsed.nodenr, "missing rel= attribute".to_string()));
            None
        }
    }
}
