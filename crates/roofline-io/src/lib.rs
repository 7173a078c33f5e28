//! roofline-io — PLY reader/writer. Every scalar vertex property other than
//! x/y/z becomes a scalar layer, and every layer is written back out.

use anyhow::{bail, Context, Result};
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Ply, Property, PropertyType};
use roofline_core::Cloud;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

/// Reads ASCII or binary PLY.
pub fn read_ply(path: &str) -> Result<Cloud> {
    let f = File::open(path).with_context(|| format!("open {}", path))?;
    let mut reader = BufReader::new(f);
    let parser = Parser::<DefaultElement>::new();
    let ply: Ply<DefaultElement> = parser.read_ply(&mut reader).with_context(|| format!("parse {}", path))?;

    let def = ply.header.elements.get("vertex")
        .ok_or_else(|| anyhow::anyhow!("PLY missing 'vertex' element"))?;
    let names: Vec<&str> = def.properties.iter()
        .filter(|(_, p)| matches!(p.data_type, PropertyType::Scalar(_)))
        .map(|(k, _)| k.as_str())
        .filter(|k| !matches!(*k, "x" | "y" | "z"))
        .collect();
    let skipped = def.properties.values()
        .filter(|p| !matches!(p.data_type, PropertyType::Scalar(_)))
        .count();
    if skipped > 0 {
        log::debug!("{}: ignoring {} list properties", path, skipped);
    }

    let vertex = ply.payload.get("vertex").map(Vec::as_slice).unwrap_or_default();
    let mut c = Cloud::default();
    c.reserve(vertex.len());
    let mut columns: Vec<Vec<f32>> = names.iter().map(|_| Vec::with_capacity(vertex.len())).collect();

    for (i, el) in vertex.iter().enumerate() {
        let x = get_f32(el, "x").with_context(|| format!("vertex {}", i))?;
        let y = get_f32(el, "y").with_context(|| format!("vertex {}", i))?;
        let z = get_f32(el, "z").with_context(|| format!("vertex {}", i))?;
        c.push(x, y, z);
        for (col, name) in columns.iter_mut().zip(&names) {
            col.push(get_f32(el, name).with_context(|| format!("vertex {}", i))?);
        }
    }
    for (name, col) in names.iter().zip(columns) {
        c.set_layer(name, col)?;
    }
    log::debug!("{}: {} points, layers {:?}", path, c.len(), c.layer_names());
    Ok(c)
}

fn get_f32(el: &DefaultElement, key: &str) -> Result<f32> {
    match el.get(key) {
        Some(Property::Float(v)) => Ok(*v),
        Some(Property::Double(v)) => Ok(*v as f32),
        Some(Property::Char(v)) => Ok(*v as f32),
        Some(Property::UChar(v)) => Ok(*v as f32),
        Some(Property::Short(v)) => Ok(*v as f32),
        Some(Property::UShort(v)) => Ok(*v as f32),
        Some(Property::Int(v)) => Ok(*v as f32),
        Some(Property::UInt(v)) => Ok(*v as f32),
        Some(_) => bail!("property '{}' not scalar", key),
        None => bail!("missing property '{}'", key),
    }
}

/// Writes x/y/z and every layer (name-sorted) as float properties.
pub fn write_ply_ascii(path: &str, cloud: &Cloud) -> Result<()> {
    let n = cloud.len();
    let keys = cloud.layer_names();
    let mut columns = Vec::with_capacity(keys.len());
    for k in &keys {
        if k.is_empty() || k.chars().any(char::is_whitespace) || matches!(*k, "x" | "y" | "z") {
            bail!("layer name '{}' cannot be a PLY property", k);
        }
        columns.push(cloud.layer(k)?);
    }

    let mut w = BufWriter::new(File::create(path).with_context(|| format!("create {}", path))?);

    // Header
    writeln!(w, "ply")?;
    writeln!(w, "format ascii 1.0")?;
    writeln!(w, "element vertex {}", n)?;
    writeln!(w, "property float x")?;
    writeln!(w, "property float y")?;
    writeln!(w, "property float z")?;
    for k in &keys {
        writeln!(w, "property float {}", k)?;
    }
    writeln!(w, "end_header")?;

    // Body
    for i in 0..n {
        write!(w, "{} {} {}", cloud.x[i], cloud.y[i], cloud.z[i])?;
        for col in &columns {
            write!(w, " {}", col[i])?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_auto(path: &str) -> Result<Cloud> {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".ply") {
        return read_ply(path);
    }
    // fallback: try PLY and report clearly
    match read_ply(path) {
        Ok(c) => Ok(c),
        Err(e) => Err(anyhow::anyhow!("Unsupported file (expected .ply). Root error: {e:#}")),
    }
}
