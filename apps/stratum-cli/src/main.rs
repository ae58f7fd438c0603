//! Command line front end: load a geometry description and inspect it.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use stratum_core::{AnyGeometry, Manager, MaterialRegistry, Reference, Vec2, Vec3};
use stratum_io::{read_document, GeometryDocument, ObjectReaders};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Args, Debug)]
struct Source {
    /// Geometry description (JSON)
    file: PathBuf,

    /// Known material names, comma separated
    #[arg(short, long, value_delimiter = ',')]
    materials: Vec<String>,

    /// Accept unknown materials and leaves without material
    #[arg(long)]
    draft: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize the geometries, named objects and paths of a file
    Info {
        #[command(flatten)]
        source: Source,

        /// Describe only this object
        #[arg(short, long)]
        object: Option<String>,
    },
    /// Print the material at a point of a named object
    Material {
        #[command(flatten)]
        source: Source,

        #[arg(short, long)]
        object: String,

        /// Point coordinates: tran,vert in 2D or lon,tran,vert in 3D
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        at: Vec<f64>,
    },
}

#[derive(Serialize)]
struct ObjectInfo {
    name: Option<String>,
    #[serde(rename = "type")]
    type_name: &'static str,
    dimensions: usize,
    lower: Vec<f64>,
    upper: Vec<f64>,
    children: usize,
    roles: Vec<String>,
}

impl ObjectInfo {
    fn new(object: &AnyGeometry) -> Self {
        let (lower, upper) = match object {
            AnyGeometry::D2(o) => {
                let bb = o.bounding_box();
                (bb.lower.0.to_vec(), bb.upper.0.to_vec())
            }
            AnyGeometry::D3(o) => {
                let bb = o.bounding_box();
                (bb.lower.0.to_vec(), bb.upper.0.to_vec())
            }
        };
        let o = object.object();
        Self {
            name: o.name(),
            type_name: o.type_name(),
            dimensions: o.dimensions(),
            lower,
            upper,
            children: o.children_count(),
            roles: o.roles().into_iter().collect(),
        }
    }
}

#[derive(Serialize)]
struct ManagerInfo {
    geometries: Vec<ObjectInfo>,
    objects: Vec<String>,
    paths: Vec<String>,
}

fn load(source: &Source) -> Result<Manager, Box<dyn Error>> {
    let json = fs::read_to_string(&source.file)?;
    let mut document: GeometryDocument = serde_json::from_str(&json)?;
    document.settings.draft |= source.draft;
    let materials = MaterialRegistry::with_names(source.materials.iter().map(String::as_str));
    Ok(read_document(&document, &materials, &ObjectReaders::with_defaults())?)
}

fn info(manager: &Manager, object: Option<&str>) -> Result<String, Box<dyn Error>> {
    let json = match object {
        Some(name) => match manager.resolve_reference(name)? {
            Reference::Object(object) => serde_json::to_string_pretty(&ObjectInfo::new(&object))?,
            Reference::Path(hints) => format!("\"{name}\" is a path with {} hints", hints.len()),
        },
        None => serde_json::to_string_pretty(&ManagerInfo {
            geometries: manager.roots().iter().map(ObjectInfo::new).collect(),
            objects: manager.object_names().map(str::to_string).collect(),
            paths: manager.path_names().map(str::to_string).collect(),
        })?,
    };
    Ok(json)
}

fn material(manager: &Manager, name: &str, at: &[f64]) -> Result<String, Box<dyn Error>> {
    let object = manager.require_object_with_name(name)?;
    let found = match (&object, at) {
        (AnyGeometry::D2(o), &[tran, vert]) => o.material(&Vec2::new([tran, vert])),
        (AnyGeometry::D3(o), &[lon, tran, vert]) => o.material(&Vec3::new([lon, tran, vert])),
        _ => {
            return Err(format!(
                "\"{name}\" is {}-dimensional, got {} coordinates",
                object.dimensions(),
                at.len()
            )
            .into())
        }
    };
    Ok(found
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| "(none)".to_string()))
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let output = match &args.cmd {
        Command::Info { source, object } => info(&load(source)?, object.as_deref())?,
        Command::Material { source, object, at } => material(&load(source)?, object, at)?,
    };
    println!("{output}");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_io::load_from_str;

    fn manager() -> Manager {
        let materials = MaterialRegistry::with_names(["GaAs", "Au"]);
        load_from_str(
            r#"{ "geometries": [ { "type": "cartesian2d", "name": "main", "length": 2.0,
                "root": { "type": "stack", "name": "layers", "children": [
                  { "type": "rectangle", "size": [1.0, 0.5], "material": "Au", "path": "top" },
                  { "type": "rectangle", "size": [1.0, 1.0], "material": "GaAs" } ] } } ] }"#,
            &materials,
        )
        .unwrap()
    }

    #[test]
    fn test_material_lookup() {
        let m = manager();
        assert_eq!(material(&m, "layers", &[0.5, 1.2]).unwrap(), "Au");
        assert_eq!(material(&m, "main", &[1.0, 0.5, 0.5]).unwrap(), "GaAs");
        assert_eq!(material(&m, "layers", &[2.5, 0.5]).unwrap(), "(none)");
        assert!(material(&m, "layers", &[0.5, 0.5, 0.5]).is_err());
        assert!(material(&m, "missing", &[0.5, 0.5]).is_err());
    }

    #[test]
    fn test_info() {
        let m = manager();
        let summary: serde_json::Value = serde_json::from_str(&info(&m, None).unwrap()).unwrap();
        assert_eq!(summary["geometries"][0]["type"], "extrusion");
        assert_eq!(summary["paths"][0], "top");
        let layers: serde_json::Value =
            serde_json::from_str(&info(&m, Some("layers")).unwrap()).unwrap();
        assert_eq!(layers["children"], 2);
        assert_eq!(layers["upper"][1], 1.5);
        assert!(info(&m, Some("top")).unwrap().contains("path"));
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from([
            "stratum", "material", "geo.json", "-m", "GaAs,Au", "--object", "main", "--at",
            "0,-1.5,2",
        ]);
        let Command::Material { source, at, .. } = args.cmd else {
            panic!("expected the material command");
        };
        assert_eq!(source.materials, vec!["GaAs", "Au"]);
        assert_eq!(at, vec![0.0, -1.5, 2.0]);
    }
}
