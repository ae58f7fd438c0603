use stratum_core::{
    objects_with_role, vec2, vec3, AnyGeometry, GeometryError, MaterialRegistry, Reference,
    Rectangle,
};
use stratum_io::{
    load_from_str, read_document, GeometryDocument, GeometryReader, ObjectNode, ObjectReaders,
    ReaderError,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn materials() -> MaterialRegistry {
    MaterialRegistry::with_names(["GaAs", "AlGaAs", "Au"])
}

const LASER: &str = r#"{
  "geometries": [
    { "type": "cartesian2d", "name": "laser", "length": 100.0,
      "root": { "type": "stack", "name": "layers", "align": "center", "children": [
        { "type": "rectangle", "name": "contact", "size": [2.0, 0.1], "material": "Au" },
        { "type": "rectangle", "size": [4.0, 1.0], "material": "AlGaAs" },
        { "type": "rectangle", "name": "active", "role": "gain", "size": [4.0, 0.2],
          "material": "GaAs", "path": "junction" },
        { "type": "zero" },
        { "type": "rectangle", "size": [4.0, 1.0], "material": "AlGaAs" }
      ] } },
    { "type": "cylindrical", "name": "vcsel",
      "root": { "type": "again", "ref": "layers" } }
  ]
}"#;

#[test]
fn test_load_layered_geometries() {
    init_logger();
    let manager = load_from_str(LASER, &materials()).unwrap();
    assert_eq!(manager.roots().len(), 2);

    let laser = manager.require_object_with_name("laser").unwrap().as_3d().unwrap();
    assert_eq!(laser.type_name(), "extrusion");
    let gaas = laser.material(&vec3(50.0, 0.0, 0.1)).unwrap();
    assert_eq!(gaas.name(), "GaAs");
    let au = laser.material(&vec3(50.0, 0.5, 1.25)).unwrap();
    assert_eq!(au.name(), "Au");
    assert!(laser.material(&vec3(50.0, 1.5, 1.25)).is_none());
    assert!(laser.material(&vec3(150.0, 0.0, 0.1)).is_none());

    let vcsel = manager.require_object_with_name("vcsel").unwrap().as_3d().unwrap();
    assert_eq!(vcsel.type_name(), "revolution");
    let m = vcsel.material(&vec3(0.0, 1.0, -0.5)).unwrap();
    assert_eq!(m.name(), "AlGaAs");

    let layers = manager.require_object_with_name("layers").unwrap();
    let gain = objects_with_role(layers.object(), "gain");
    assert_eq!(gain.len(), 1);
    assert!(gain[0].ptr_eq(&manager.require_object_with_name("active").unwrap()));

    match manager.resolve_reference("junction").unwrap() {
        Reference::Path(hints) => assert_eq!(hints.len(), 1),
        Reference::Object(_) => panic!("expected a path"),
    }
}

#[test]
fn test_paths_restrict_queries() {
    init_logger();
    let json = r#"{ "geometries": [ { "type": "cartesian2d", "name": "twice",
        "root": { "type": "container", "children": [
          { "type": "rectangle", "name": "r", "size": [1.0, 1.0], "material": "GaAs",
            "path": "left" },
          { "type": "again", "ref": "r", "item": { "at": [3.0, 0.0] }, "path": "right" }
        ] } } ] }"#;
    let manager = load_from_str(json, &materials()).unwrap();
    let twice = manager.require_object_with_name("twice").unwrap().as_3d().unwrap();
    let container = manager.roots()[0].object().child_object_at(0).unwrap().as_2d().unwrap();
    let r = manager.require_object_with_name("r").unwrap();

    let everywhere = container.leafs_bounding_boxes(None);
    assert_eq!(everywhere.len(), 2);
    let right = manager.require_path_hints("right").unwrap();
    let boxes = container.leafs_bounding_boxes(Some(right));
    assert_eq!(boxes.len(), 1);
    assert!((boxes[0].lower.tran() - 3.0).abs() < 1e-10);

    let paths = container.paths_to(r.id(), Some(manager.require_path_hints("left").unwrap()));
    assert_eq!(paths.unwrap().paths().len(), 1);
    assert!(twice.includes(&vec3(0.0, 3.5, 0.5)));
}

#[test]
fn test_errors_are_reported() {
    init_logger();
    let unknown_material = r#"{ "geometries": [ { "type": "cartesian2d",
        "root": { "type": "rectangle", "size": [1.0, 1.0], "material": "InP" } } ] }"#;
    assert!(matches!(
        load_from_str(unknown_material, &materials()),
        Err(ReaderError::Geometry(GeometryError::NoSuchMaterial(_)))
    ));

    let draft = r#"{ "settings": { "draft": true }, "geometries": [ { "type": "cartesian2d",
        "root": { "type": "rectangle", "size": [1.0, 1.0], "material": "InP" } } ] }"#;
    assert!(load_from_str(draft, &materials()).is_ok());

    let conflict = r#"{ "geometries": [ { "type": "cartesian3d", "name": "g",
        "root": { "type": "block", "name": "g", "size": [1.0, 1.0, 1.0], "material": "Au" } } ] }"#;
    assert!(matches!(
        load_from_str(conflict, &materials()),
        Err(ReaderError::Geometry(GeometryError::NamesConflict(_)))
    ));

    let wrong_root = r#"{ "geometries": [ { "type": "cylindrical",
        "root": { "type": "block", "size": [1.0, 1.0, 1.0], "material": "Au" } } ] }"#;
    assert!(load_from_str(wrong_root, &materials()).is_err());

    assert!(matches!(
        load_from_str("{ \"geometries\": 3 }", &materials()),
        Err(ReaderError::Json(_))
    ));
}

fn read_square(
    reader: &mut GeometryReader<'_>,
    node: &ObjectNode,
) -> stratum_io::Result<AnyGeometry> {
    let side: f64 = node.require_attr("side")?;
    let material: String = node.require_attr("material")?;
    let material = reader.get_material(&material)?;
    Ok(AnyGeometry::d2(Rectangle::new(vec2(side, side), material)))
}

#[test]
fn test_custom_reader() {
    init_logger();
    let mut readers = ObjectReaders::with_defaults();
    readers.register_object_reader("square", read_square);
    let document: GeometryDocument = serde_json::from_str(
        r#"{ "geometries": [ { "type": "cartesian2d", "name": "sq",
            "root": { "type": "stack", "children": [
              { "type": "square", "side": 2.0, "material": "Au" },
              { "type": "square", "side": 1.0, "material": "GaAs" } ] } } ] }"#,
    )
    .unwrap();
    let manager = read_document(&document, &materials(), &readers).unwrap();
    let sq = manager.require_object_with_name("sq").unwrap().as_3d().unwrap();
    let bb = sq.bounding_box();
    assert!((bb.upper[2] - 3.0).abs() < 1e-10);
    assert!((bb.upper[1] - 2.0).abs() < 1e-10);
}
