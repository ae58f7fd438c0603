//! Readers of the built-in object kinds.

use std::sync::Arc;

use serde_json::Value;
use stratum_core::leaf::{BlockShape, GapShape, TriangleShape};
use stratum_core::{
    AlignStrategy, Aligner, AnyGeometry, ArrangeContainer, DVec, Dim, Extrusion, Gap, Lattice,
    LatticePolygon, Leaf, MultiStackContainer, ObjectRef, Revolution, ShelfContainer,
    StackContainer, SupportedDim, Translation, TranslationContainer, Vec2, Vec3,
};

use crate::error::{ReaderError, Result};
use crate::node::{ChildNode, ObjectNode};
use crate::reader::{GeometryReader, ObjectReaders};

pub(crate) fn register_defaults(registry: &mut ObjectReaders) {
    registry.register_object_reader("block2d", read_block::<2>);
    registry.register_object_reader("block3d", read_block::<3>);
    registry.register_object_reader("rectangle", read_block::<2>);
    registry.register_object_reader("cuboid", read_block::<3>);
    registry.register_object_reader("triangle", read_triangle);
    registry.register_object_reader("gap", read_gap);

    registry.register_object_reader("translation2d", read_translation::<2>);
    registry.register_object_reader("translation3d", read_translation::<3>);
    registry.register_object_reader("extrusion", read_extrusion);
    registry.register_object_reader("revolution", read_revolution);

    registry.register_object_reader("container2d", read_container::<2>);
    registry.register_object_reader("container3d", read_container::<3>);
    registry.register_object_reader("stack2d", read_stack::<2>);
    registry.register_object_reader("stack3d", read_stack::<3>);
    registry.register_object_reader("shelf2d", read_shelf);
    registry.register_object_reader("shelf", read_shelf);
    registry.register_object_reader("arrange2d", read_arrange::<2>);
    registry.register_object_reader("arrange3d", read_arrange::<3>);
    registry.register_object_reader("lattice", read_lattice);
}

/// Tag of the child marking the position of zero in stacks and shelves.
const ZERO_MARKER: &str = "zero";

fn wrap<const DIM: usize>(object: ObjectRef<DIM>) -> AnyGeometry
where
    Dim<DIM>: SupportedDim<DIM>,
{
    stratum_core::erase(object)
}

// ── Leaves ──

fn read_block<const DIM: usize>(reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    let size: DVec<DIM> = node.require_attr("size")?;
    let material = reader.read_material(node)?;
    let block: ObjectRef<DIM> = Leaf::with_shape(BlockShape { size }, material);
    Ok(wrap(block))
}

fn read_triangle(reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry> {
    let p0: Vec2 = node.require_attr("p0")?;
    let p1: Vec2 = node.require_attr("p1")?;
    let material = reader.read_material(node)?;
    Ok(AnyGeometry::d2(Leaf::with_shape(TriangleShape { p0, p1 }, material)))
}

fn read_gap(_reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry> {
    Ok(AnyGeometry::d2(Gap::new(node.attr_or("size", 0.0)?)))
}

// ── Transforms ──

fn read_translation<const DIM: usize>(
    reader: &mut GeometryReader<'_>,
    node: &ObjectNode,
) -> Result<AnyGeometry>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    let at: DVec<DIM> = node.attr_or("at", DVec::ZERO)?;
    let child = reader.read_exactly_one_child::<DIM>(node)?;
    let translation: ObjectRef<DIM> = Translation::new(Some(child), at);
    Ok(wrap(translation))
}

fn read_extrusion(reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry> {
    let length: f64 = node.require_attr("length")?;
    if length < 0.0 {
        return Err(ReaderError::bad_attribute(&node.tag, "length", "must not be negative"));
    }
    let child = reader.read_exactly_one_child::<2>(node)?;
    Ok(AnyGeometry::d3(Extrusion::new(Some(child), length)))
}

fn read_revolution(reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry> {
    let child = reader.read_exactly_one_child::<2>(node)?;
    Ok(AnyGeometry::d3(Revolution::new(Some(child))))
}

// ── Containers ──

fn read_container<const DIM: usize>(
    reader: &mut GeometryReader<'_>,
    node: &ObjectNode,
) -> Result<AnyGeometry>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    let container = TranslationContainer::<DIM>::new();
    reader.read_children(node, |reader, child| {
        let at: DVec<DIM> = child.item_attr("at")?.unwrap_or(DVec::ZERO);
        let object = reader.read_object_as::<DIM>(&child.object)?;
        Ok(Some(container.add(object, at)?))
    })?;
    let container: ObjectRef<DIM> = container;
    Ok(wrap(container))
}

/// Alignment given as an edge name or as a number.
fn parse_strategy(tag: &str, attr: &str, value: Option<Value>) -> Result<Option<AlignStrategy>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|x| Some(AlignStrategy::Fixed(x)))
            .ok_or_else(|| ReaderError::bad_attribute(tag, attr, "not a finite number")),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|e| ReaderError::bad_attribute(tag, attr, e)),
        Some(other) => Err(ReaderError::bad_attribute(
            tag,
            attr,
            format!("expected a string or a number, got {other}"),
        )),
    }
}

/// Aligner from `align` and, in 3D, `align_lon`, falling back to `default`.
fn aligner_from<const DIM: usize>(
    tag: &str,
    align: Option<Value>,
    align_lon: Option<Value>,
    default: Aligner,
) -> Result<Aligner> {
    let tran = parse_strategy(tag, "align", align)?.unwrap_or(default.tran);
    let lon = if DIM == 3 {
        parse_strategy(tag, "align_lon", align_lon)?.or(default.lon)
    } else {
        None
    };
    Ok(Aligner { tran, lon })
}

fn child_aligner<const DIM: usize>(child: &ChildNode, default: Aligner) -> Result<Aligner> {
    aligner_from::<DIM>(
        &child.object.tag,
        child.item_attr("align")?,
        child.item_attr("align_lon")?,
        default,
    )
}

fn read_stack<const DIM: usize>(reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    let base: f64 = node.attr_or("shift", 0.0)?;
    let aligner = aligner_from::<DIM>(
        &node.tag,
        node.attr("align")?,
        node.attr("align_lon")?,
        Aligner::default(),
    )?;
    let object: ObjectRef<DIM> = match node.attr::<usize>("repeat")? {
        Some(repeat) => {
            let multi = MultiStackContainer::<DIM>::with_aligner(repeat, base, aligner);
            fill_stack(reader, node, &multi)?;
            multi
        }
        None => {
            let stack = StackContainer::<DIM>::with_aligner(base, aligner);
            fill_stack(reader, node, &stack)?;
            stack
        }
    };
    Ok(wrap(object))
}

/// Children of stacks are listed from the top down.
fn fill_stack<const DIM: usize>(
    reader: &mut GeometryReader<'_>,
    node: &ObjectNode,
    stack: &StackContainer<DIM>,
) -> Result<()>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    let count = || stack.heights().len() - 1;
    let mut zero_from_top = None;
    reader.read_children(node, |reader, child| {
        if child.object.tag == ZERO_MARKER {
            zero_from_top = Some(count());
            return Ok(None);
        }
        let aligner = child_aligner::<DIM>(child, stack.default_aligner())?;
        let object = reader.read_object_as::<DIM>(&child.object)?;
        Ok(Some(stack.push_front(object, aligner)?))
    })?;
    if let Some(from_top) = zero_from_top {
        stack.set_zero_before(count() - from_top)?;
    }
    Ok(())
}

/// Children of shelves are listed from left to right. One gap may have a
/// `total` width instead of a `size`, filling the shelf up to that width.
fn read_shelf(reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry> {
    let shelf = ShelfContainer::new(node.attr_or("shift", 0.0)?);
    let mut zero_before = None;
    let mut total_gap: Option<(Arc<Gap>, f64)> = None;
    reader.read_children(node, |reader, child| {
        match child.object.tag.as_str() {
            ZERO_MARKER => {
                zero_before = Some(shelf.boundaries().len() - 1);
                Ok(None)
            }
            "gap" if child.object.has_attr("total") => {
                if total_gap.is_some() {
                    return Err(ReaderError::bad_attribute(
                        &node.tag,
                        "total",
                        "only one gap may have the total width",
                    ));
                }
                let gap = Gap::new(0.0);
                total_gap = Some((gap.clone(), child.object.require_attr("total")?));
                Ok(Some(shelf.push_back(gap)?))
            }
            _ => {
                let object = reader.read_object_as::<2>(&child.object)?;
                Ok(Some(shelf.push_back(object)?))
            }
        }
    })?;
    if let Some((gap, total)) = total_gap {
        let boundaries = shelf.boundaries();
        let width = boundaries.last().copied().unwrap_or(0.0) - boundaries[0];
        if width > total {
            return Err(ReaderError::bad_attribute(
                "gap",
                "total",
                format!("{total} is less than the width of the other children ({width})"),
            ));
        }
        gap.set_shape(GapShape { size: total - width });
    }
    if let Some(index) = zero_before {
        shelf.set_zero_before(index)?;
    }
    if node.attr_or("flat", false)? {
        shelf.ensure_flat()?;
    }
    Ok(AnyGeometry::d2(shelf))
}

fn read_arrange<const DIM: usize>(reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    let step: DVec<DIM> = node.require_attr("step")?;
    let count: usize = node.require_attr("count")?;
    let warn = node.attr_or("warn", reader.settings().warn_overlapping)?;
    let child = reader.read_exactly_one_child::<DIM>(node)?;
    let arrange: ObjectRef<DIM> = ArrangeContainer::with_overlap_warning(Some(child), step, count, warn);
    Ok(wrap(arrange))
}

/// Copies of the child at the nodes `i * vec0 + j * vec1` inside `segments`,
/// a list of closed polygons with integer vertices `[i, j]`.
fn read_lattice(reader: &mut GeometryReader<'_>, node: &ObjectNode) -> Result<AnyGeometry> {
    let vec0: Vec3 = node.require_attr("vec0")?;
    let vec1: Vec3 = node.require_attr("vec1")?;
    let segments: Vec<LatticePolygon> = node.attr_or("segments", Vec::new())?;
    let child = reader.read_exactly_one_child::<3>(node)?;
    let lattice = Lattice::new(Some(child), vec0, vec1);
    lattice.set_segments(segments)?;
    Ok(AnyGeometry::d3(lattice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ReaderSettings;
    use stratum_core::{vec2, vec3, GeometryError, Manager, MaterialRegistry};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn read(node: &str, dimensions: usize) -> Result<(AnyGeometry, Manager)> {
        init_logger();
        let node: ObjectNode = serde_json::from_str(node)?;
        let db = MaterialRegistry::with_names(["GaAs", "AlAs", "InP"]);
        let readers = ObjectReaders::with_defaults();
        let mut manager = Manager::new();
        let object = {
            let mut reader = GeometryReader::new(&mut manager, &db, &readers, ReaderSettings::default());
            reader.with_dimensions(dimensions, |r| r.read_object(&node))?
        };
        Ok((object, manager))
    }

    fn material_name(object: &ObjectRef<2>, tran: f64, vert: f64) -> Option<String> {
        object
            .material(&vec2(tran, vert))
            .map(|m| m.name().to_string())
    }

    #[test]
    fn test_stack_children_top_first() {
        let (object, manager) = read(
            r#"{ "type": "stack", "name": "s", "children": [
                { "type": "rectangle", "size": [1.0, 0.5], "material": "GaAs", "path": "upper" },
                { "type": "rectangle", "size": [1.0, 1.0], "material": "AlAs" }
            ] }"#,
            2,
        )
        .unwrap();
        let stack = object.as_2d().unwrap();
        assert_eq!(stack.type_name(), "stack2d");
        assert!((stack.bounding_box().height() - 1.5).abs() < 1e-10);
        assert_eq!(material_name(&stack, 0.5, 0.5).as_deref(), Some("AlAs"));
        assert_eq!(material_name(&stack, 0.5, 1.2).as_deref(), Some("GaAs"));
        assert_eq!(manager.require_path_hints("upper").unwrap().len(), 1);
        assert!(manager.get_object("s").is_some());
    }

    #[test]
    fn test_stack_zero_and_alignment() {
        let (object, _) = read(
            r#"{ "type": "stack", "align": "center", "children": [
                { "type": "rectangle", "size": [2.0, 0.5], "material": "GaAs" },
                { "type": "zero" },
                { "type": "rectangle", "size": [4.0, 1.0], "material": "AlAs",
                  "item": { "align": "left" } }
            ] }"#,
            2,
        )
        .unwrap();
        let bb = object.as_2d().unwrap().bounding_box();
        assert!((bb.lower.vert() + 1.0).abs() < 1e-10);
        assert!((bb.upper.vert() - 0.5).abs() < 1e-10);
        assert!((bb.lower.tran() + 1.0).abs() < 1e-10);
        assert!((bb.upper.tran() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_multistack_repeat() {
        let (object, _) = read(
            r#"{ "type": "stack", "repeat": 3, "shift": 1.0, "children": [
                { "type": "rectangle", "size": [1.0, 0.25], "material": "GaAs" },
                { "type": "rectangle", "size": [1.0, 0.75], "material": "AlAs" }
            ] }"#,
            2,
        )
        .unwrap();
        let stack = object.as_2d().unwrap();
        assert_eq!(stack.type_name(), "multistack2d");
        assert_eq!(stack.children_count(), 6);
        let bb = stack.bounding_box();
        assert!((bb.lower.vert() - 1.0).abs() < 1e-10);
        assert!((bb.upper.vert() - 4.0).abs() < 1e-10);
        assert_eq!(material_name(&stack, 0.5, 3.9).as_deref(), Some("GaAs"));
        assert_eq!(material_name(&stack, 0.5, 3.5).as_deref(), Some("AlAs"));
    }

    #[test]
    fn test_stack3d_aligners() {
        let (object, _) = read(
            r#"{ "type": "stack", "align": "c", "align_lon": "c", "children": [
                { "type": "block", "size": [2.0, 2.0, 1.0], "material": "GaAs" }
            ] }"#,
            3,
        )
        .unwrap();
        let bb = object.as_3d().unwrap().bounding_box();
        assert!((bb.lower[0] + 1.0).abs() < 1e-10);
        assert!((bb.lower[1] + 1.0).abs() < 1e-10);
        assert!(bb.lower[2].abs() < 1e-10);
    }

    #[test]
    fn test_shelf_gaps_and_flatness() {
        let (object, _) = read(
            r#"{ "type": "shelf", "flat": true, "children": [
                { "type": "rectangle", "size": [1.0, 2.0], "material": "GaAs" },
                { "type": "gap", "total": 5.0 },
                { "type": "zero" },
                { "type": "rectangle", "size": [2.0, 2.0], "material": "AlAs" }
            ] }"#,
            2,
        )
        .unwrap();
        let shelf = object.as_2d().unwrap();
        let bb = shelf.bounding_box();
        assert!((bb.lower.tran() + 3.0).abs() < 1e-10);
        assert!((bb.upper.tran() - 2.0).abs() < 1e-10);
        assert_eq!(material_name(&shelf, 1.0, 1.0).as_deref(), Some("AlAs"));
        assert!(material_name(&shelf, -1.0, 1.0).is_none());

        let err = read(
            r#"{ "type": "shelf", "flat": true, "children": [
                { "type": "rectangle", "size": [1.0, 2.0], "material": "GaAs" },
                { "type": "rectangle", "size": [1.0, 1.0], "material": "AlAs" }
            ] }"#,
            2,
        )
        .unwrap_err();
        assert!(matches!(err, ReaderError::Geometry(GeometryError::BadInput { .. })));
    }

    #[test]
    fn test_container_placement() {
        let (object, manager) = read(
            r#"{ "type": "container", "children": [
                { "type": "rectangle", "name": "a", "size": [1.0, 1.0], "material": "GaAs",
                  "item": { "at": [2.0, 3.0] }, "path": "p" },
                { "type": "again", "ref": "a", "item": { "at": [5.0, 0.0] } }
            ] }"#,
            2,
        )
        .unwrap();
        let container = object.as_2d().unwrap();
        assert_eq!(container.children_count(), 2);
        assert!(container.includes(&vec2(2.5, 3.5)));
        assert!(container.includes(&vec2(5.5, 0.5)));
        assert!(!container.includes(&vec2(0.5, 0.5)));
        let a = manager.require_object_with_name("a").unwrap();
        let paths = container.paths_to(a.id(), None).unwrap();
        assert_eq!(paths.paths().len(), 2);
        assert_eq!(manager.require_path_hints("p").unwrap().len(), 1);
    }

    #[test]
    fn test_transforms() {
        let (object, _) = read(
            r#"{ "type": "extrusion", "length": 10.0, "children": [
                { "type": "translation", "at": [1.0, 0.0], "children": [
                    { "type": "rectangle", "size": [1.0, 1.0], "material": "InP" }
                ] }
            ] }"#,
            3,
        )
        .unwrap();
        let extrusion = object.as_3d().unwrap();
        assert!(extrusion.includes(&vec3(5.0, 1.5, 0.5)));
        assert!(!extrusion.includes(&vec3(11.0, 1.5, 0.5)));

        let err = read(r#"{ "type": "revolution" }"#, 3).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::UnexpectedChildren { expected: 1, actual: 0, .. }
        ));
    }

    #[test]
    fn test_arrange_and_lattice() {
        let (object, _) = read(
            r#"{ "type": "arrange", "step": [2.0, 0.0], "count": 3, "children": [
                { "type": "rectangle", "size": [1.0, 1.0], "material": "GaAs" }
            ] }"#,
            2,
        )
        .unwrap();
        let arrange = object.as_2d().unwrap();
        assert_eq!(arrange.children_count(), 3);
        assert!(arrange.includes(&vec2(4.5, 0.5)));
        assert!(!arrange.includes(&vec2(3.5, 0.5)));

        let (object, _) = read(
            r#"{ "type": "lattice", "vec0": [2.0, 0.0, 0.0], "vec1": [0.0, 2.0, 0.0],
                 "segments": [[[0, 0], [1, 0], [1, 1], [0, 1]]],
                 "children": [{ "type": "block", "size": [1.0, 1.0, 1.0], "material": "GaAs" }] }"#,
            3,
        )
        .unwrap();
        let lattice = object.as_3d().unwrap();
        assert_eq!(lattice.children_count(), 4);
        assert!(lattice.includes(&vec3(2.5, 2.5, 0.5)));
        assert!(!lattice.includes(&vec3(4.5, 0.5, 0.5)));
    }
}
