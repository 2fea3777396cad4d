//! Mesh import: Wavefront OBJ via tobj and a small PLY reader.
//!
//! Both importers produce a single indexed [`Geometry`]. OBJ faces index
//! position, normal and texcoord channels independently, so corner tuples
//! are rebuilt into full vertices and deduplicated; identical corners shared
//! between faces collapse to one vertex.

use std::collections::HashMap;
use std::io::{BufReader, Cursor};
use std::path::Path;

use crate::data_structures::geometry::{Geometry, Vertex};
use crate::resources::{load_binary, load_string};

/// Bit-pattern key over every vertex channel. Exact equality is what OBJ
/// corner dedup wants, approximate merging would weld unrelated seams.
fn vertex_key(v: &Vertex) -> [u32; 14] {
    let f = [
        v.position[0],
        v.position[1],
        v.position[2],
        v.normal[0],
        v.normal[1],
        v.normal[2],
        v.tangent[0],
        v.tangent[1],
        v.tangent[2],
        v.uv[0],
        v.uv[1],
        v.color[0],
        v.color[1],
        v.color[2],
    ];
    let mut key = [0u32; 14];
    for (slot, value) in key.iter_mut().zip(f) {
        *slot = value.to_bits();
    }
    key
}

/// Collapse equal corner tuples into shared indexed vertices.
pub fn dedup_vertices(corners: &[Vertex]) -> (Vec<Vertex>, Vec<u32>) {
    let mut seen: HashMap<[u32; 14], u32> = HashMap::with_capacity(corners.len());
    let mut vertices = Vec::new();
    let mut indices = Vec::with_capacity(corners.len());
    for corner in corners {
        let index = *seen.entry(vertex_key(corner)).or_insert_with(|| {
            vertices.push(*corner);
            (vertices.len() - 1) as u32
        });
        indices.push(index);
    }
    (vertices, indices)
}

/// Import a Wavefront OBJ file. All models in the file merge into one
/// geometry; materials are ignored.
pub async fn load_obj(path: impl AsRef<Path>) -> anyhow::Result<Geometry> {
    let path = path.as_ref();
    let text = load_string(path).await?;
    let mut reader = BufReader::new(Cursor::new(text));
    let (models, _materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        },
        |_| Err(tobj::LoadError::GenericFailure),
    )?;

    let mut corners = Vec::new();
    for model in &models {
        let mesh = &model.mesh;
        let has_normal_indices = !mesh.normal_indices.is_empty();
        let has_uv_indices = !mesh.texcoord_indices.is_empty();
        for (corner, &pi) in mesh.indices.iter().enumerate() {
            let p = pi as usize * 3;
            let mut vertex = Vertex {
                position: [
                    mesh.positions[p],
                    mesh.positions[p + 1],
                    mesh.positions[p + 2],
                ],
                ..Default::default()
            };
            if !mesh.vertex_color.is_empty() {
                vertex.color = [
                    mesh.vertex_color[p],
                    mesh.vertex_color[p + 1],
                    mesh.vertex_color[p + 2],
                ];
            }
            if has_normal_indices {
                let n = mesh.normal_indices[corner] as usize * 3;
                vertex.normal = [mesh.normals[n], mesh.normals[n + 1], mesh.normals[n + 2]];
            }
            if has_uv_indices {
                let t = mesh.texcoord_indices[corner] as usize * 2;
                vertex.uv = [mesh.texcoords[t], mesh.texcoords[t + 1]];
            }
            corners.push(vertex);
        }
    }

    let (vertices, indices) = dedup_vertices(&corners);
    log::info!(
        "loaded {}: {} corners -> {} vertices, {} indices",
        path.display(),
        corners.len(),
        vertices.len(),
        indices.len()
    );
    Ok(Geometry::new(vertices, indices))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlyType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl PlyType {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "char" | "int8" => Self::Char,
            "uchar" | "uint8" => Self::UChar,
            "short" | "int16" => Self::Short,
            "ushort" | "uint16" => Self::UShort,
            "int" | "int32" => Self::Int,
            "uint" | "uint32" => Self::UInt,
            "float" | "float32" => Self::Float,
            "double" | "float64" => Self::Double,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    fn read(self, data: &[u8], offset: &mut usize) -> anyhow::Result<f64> {
        let size = self.size();
        let bytes = data
            .get(*offset..*offset + size)
            .ok_or_else(|| anyhow::anyhow!("unexpected end of PLY data"))?;
        *offset += size;
        Ok(match self {
            Self::Char => bytes[0] as i8 as f64,
            Self::UChar => bytes[0] as f64,
            Self::Short => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Self::UShort => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Self::Int => i32::from_le_bytes(bytes.try_into().unwrap()) as f64,
            Self::UInt => u32::from_le_bytes(bytes.try_into().unwrap()) as f64,
            Self::Float => f32::from_le_bytes(bytes.try_into().unwrap()) as f64,
            Self::Double => f64::from_le_bytes(bytes.try_into().unwrap()),
        })
    }
}

#[derive(Clone, Debug)]
struct PlyProperty {
    name: String,
    ty: PlyType,
    /// Count type for list properties.
    list: Option<PlyType>,
}

#[derive(Clone, Debug)]
struct PlyElement {
    name: String,
    count: usize,
    properties: Vec<PlyProperty>,
}

enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
}

/// Import a PLY file (ascii or binary little endian).
///
/// Recognized vertex properties: `x y z`, `nx ny nz`, `u v` (or `s t`) and
/// `red green blue [alpha]` as uchar. Unknown properties are skipped.
pub async fn load_ply(path: impl AsRef<Path>) -> anyhow::Result<Geometry> {
    let path = path.as_ref();
    let data = load_binary(path).await?;

    let header_end = find_header_end(&data)
        .ok_or_else(|| anyhow::anyhow!("{}: missing end_header", path.display()))?;
    let header = std::str::from_utf8(&data[..header_end])
        .map_err(|_| anyhow::anyhow!("{}: non-utf8 PLY header", path.display()))?;

    let mut format = None;
    let mut elements: Vec<PlyElement> = Vec::new();
    for line in header.lines() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("format") => {
                format = match tokens.next() {
                    Some("ascii") => Some(PlyFormat::Ascii),
                    Some("binary_little_endian") => Some(PlyFormat::BinaryLittleEndian),
                    other => anyhow::bail!("unsupported PLY format {:?}", other),
                };
            }
            Some("element") => {
                let name = tokens
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("element without a name"))?;
                let count: usize = tokens
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("element without a count"))?
                    .parse()?;
                elements.push(PlyElement {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| anyhow::anyhow!("property before any element"))?;
                let first = tokens
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("property without a type"))?;
                if first == "list" {
                    let count_ty = PlyType::parse(tokens.next().unwrap_or(""))
                        .ok_or_else(|| anyhow::anyhow!("bad list count type"))?;
                    let elem_ty = PlyType::parse(tokens.next().unwrap_or(""))
                        .ok_or_else(|| anyhow::anyhow!("bad list element type"))?;
                    let name = tokens.next().unwrap_or("").to_string();
                    element.properties.push(PlyProperty {
                        name,
                        ty: elem_ty,
                        list: Some(count_ty),
                    });
                } else {
                    let ty = PlyType::parse(first)
                        .ok_or_else(|| anyhow::anyhow!("bad property type {}", first))?;
                    let name = tokens.next().unwrap_or("").to_string();
                    element.properties.push(PlyProperty {
                        name,
                        ty,
                        list: None,
                    });
                }
            }
            _ => {}
        }
    }
    let format = format.ok_or_else(|| anyhow::anyhow!("{}: no format line", path.display()))?;

    let body = &data[header_end..];
    let mut vertices = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    match format {
        PlyFormat::Ascii => {
            let text = std::str::from_utf8(body)
                .map_err(|_| anyhow::anyhow!("{}: non-utf8 ascii PLY body", path.display()))?;
            let mut tokens = text.split_whitespace();
            for element in &elements {
                for _ in 0..element.count {
                    read_ascii_row(element, &mut tokens, &mut vertices, &mut indices)?;
                }
            }
        }
        PlyFormat::BinaryLittleEndian => {
            let mut offset = 0usize;
            for element in &elements {
                for _ in 0..element.count {
                    read_binary_row(element, body, &mut offset, &mut vertices, &mut indices)?;
                }
            }
        }
    }

    log::info!(
        "loaded {}: {} vertices, {} indices",
        path.display(),
        vertices.len(),
        indices.len()
    );
    Ok(Geometry::new(vertices, indices))
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    // Tolerate CRLF headers from Windows exporters.
    let marker = b"end_header";
    let pos = data.windows(marker.len()).position(|w| w == marker)?;
    let mut end = pos + marker.len();
    if data.get(end) == Some(&b'\r') {
        end += 1;
    }
    if data.get(end) == Some(&b'\n') {
        end += 1;
    }
    Some(end)
}

fn apply_vertex_property(vertex: &mut Vertex, name: &str, value: f64) {
    let v = value as f32;
    match name {
        "x" => vertex.position[0] = v,
        "y" => vertex.position[1] = v,
        "z" => vertex.position[2] = v,
        "nx" => vertex.normal[0] = v,
        "ny" => vertex.normal[1] = v,
        "nz" => vertex.normal[2] = v,
        "u" | "s" => vertex.uv[0] = v,
        "v" | "t" => vertex.uv[1] = v,
        "red" | "r" => vertex.color[0] = (value / 255.0) as f32,
        "green" | "g" => vertex.color[1] = (value / 255.0) as f32,
        "blue" | "b" => vertex.color[2] = (value / 255.0) as f32,
        _ => {}
    }
}

fn push_face(indices: &mut Vec<u32>, face: &[u32]) {
    // Fan triangulation, faces are assumed convex.
    for i in 1..face.len().saturating_sub(1) {
        indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
    }
}

fn read_ascii_row<'a>(
    element: &PlyElement,
    tokens: &mut impl Iterator<Item = &'a str>,
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
) -> anyhow::Result<()> {
    let mut vertex = Vertex::default();
    for property in &element.properties {
        if property.list.is_some() {
            let count: usize = next_token(tokens)?.parse()?;
            let mut face = Vec::with_capacity(count);
            for _ in 0..count {
                face.push(next_token(tokens)?.parse::<f64>()? as u32);
            }
            if element.name == "face" {
                push_face(indices, &face);
            }
        } else {
            let value: f64 = next_token(tokens)?.parse()?;
            if element.name == "vertex" {
                apply_vertex_property(&mut vertex, &property.name, value);
            }
        }
    }
    if element.name == "vertex" {
        vertices.push(vertex);
    }
    Ok(())
}

fn next_token<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> anyhow::Result<&'a str> {
    tokens
        .next()
        .ok_or_else(|| anyhow::anyhow!("unexpected end of PLY data"))
}

fn read_binary_row(
    element: &PlyElement,
    data: &[u8],
    offset: &mut usize,
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
) -> anyhow::Result<()> {
    let mut vertex = Vertex::default();
    for property in &element.properties {
        if let Some(count_ty) = property.list {
            let count = count_ty.read(data, offset)? as usize;
            let mut face = Vec::with_capacity(count);
            for _ in 0..count {
                face.push(property.ty.read(data, offset)? as u32);
            }
            if element.name == "face" {
                push_face(indices, &face);
            }
        } else {
            let value = property.ty.read(data, offset)?;
            if element.name == "vertex" {
                apply_vertex_property(&mut vertex, &property.name, value);
            }
        }
    }
    if element.name == "vertex" {
        vertices.push(vertex);
    }
    Ok(())
}
