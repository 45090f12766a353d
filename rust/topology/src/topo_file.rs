// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topology (topo) file: the persisted [`Plus`].
//!
//! Layout: header, node records, line records, area records, isle records,
//! then the node, line, area and isle spatial index blocks. Every arena slot
//! is written, dead ones as a single zero count or type, so ids survive a
//! write/read cycle. Line geometry is not stored here; the loader asks the
//! caller for the points at each line's geometry file offset.

use std::io::{Read, Write};

use nalgebra::Point3;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::arena::{Area, Isle, Line, LineTopo, Node, NodeLine, Plus};
use crate::config::BuildOptions;
use crate::error::{Error, Result};
use crate::geometry::{BoundBox, LinePoints};
use crate::keys::*;
use crate::portable::{checked_count, ByteOrder, PortInfo, PortReader, PortWriter, PORT_LONG_MAX};
use crate::spatial::{BoxIndex, SpatialIndex};

pub const TOPO_VERSION_MAJOR: u8 = 5;
pub const TOPO_VERSION_MINOR: u8 = 1;
pub const TOPO_EARLIEST_MAJOR: u8 = 5;
pub const TOPO_EARLIEST_MINOR: u8 = 1;

/// Header length with 4-byte offsets.
const HEAD_SIZE_SMALL: i32 = 142;
/// Header length with 8-byte offsets: seven section offsets and the
/// geometry file size grow by four bytes each.
const HEAD_SIZE_LARGE: i32 = HEAD_SIZE_SMALL + 32;

/// Decoded topology file header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopoHeader {
    pub version: (u8, u8),
    pub back_version: (u8, u8),
    pub byte_order: ByteOrder,
    pub head_size: i32,
    pub off_size: usize,
    pub with_z: bool,
    pub bbox: BoundBox,
    /// Arena slots, dead ones included.
    pub n_nodes: usize,
    pub n_lines: usize,
    pub n_areas: usize,
    pub n_isles: usize,
    /// Live lines per type, in type store order.
    pub type_counts: [usize; 6],
    pub node_offset: u64,
    pub line_offset: u64,
    pub area_offset: u64,
    pub isle_offset: u64,
    pub coor_size: u64,
}

/// Writes `plus` as a topology file in the byte order of `port`.
///
/// Returns the number of bytes written.
pub fn write_plus<W: Write>(plus: &Plus, out: W, port: PortInfo) -> Result<u64> {
    let off_size = if plus.coor_size > PORT_LONG_MAX { 8 } else { 4 };
    let head_size = if off_size == 8 { HEAD_SIZE_LARGE } else { HEAD_SIZE_SMALL };
    let base = head_size as u64;

    let mut body = PortWriter::new(Vec::new(), port);
    let node_offset = base + body.position();
    let mut isolated = Vec::new();
    for (i, slot) in plus.nodes.iter().enumerate() {
        match slot {
            Some(node) if !node.lines.is_empty() => write_node(&mut body, node, plus.with_z)?,
            Some(_) => {
                isolated.push(NodeId::from_index(i).get());
                body.write_int(0)?;
            }
            None => body.write_int(0)?,
        }
    }
    let line_offset = base + body.position();
    for slot in &plus.lines {
        match slot {
            Some(line) => write_line(&mut body, line, off_size)?,
            None => body.write_u8(0)?,
        }
    }
    let area_offset = base + body.position();
    for slot in &plus.areas {
        match slot {
            Some(area) => write_area(&mut body, area)?,
            None => body.write_int(0)?,
        }
    }
    let isle_offset = base + body.position();
    for slot in &plus.isles {
        match slot {
            Some(isle) => write_isle(&mut body, isle)?,
            None => body.write_int(0)?,
        }
    }

    if isolated.is_empty() {
        plus.node_index.write_to(&mut body)?;
    } else {
        debug!(count = isolated.len(), "skipping nodes without lines");
        let mut index = plus.node_index.clone();
        for id in isolated {
            index.delete(id);
        }
        index.write_to(&mut body)?;
    }
    plus.line_index.write_to(&mut body)?;
    plus.area_index.write_to(&mut body)?;
    plus.isle_index.write_to(&mut body)?;
    let body = body.into_inner();

    let header = TopoHeader {
        version: (TOPO_VERSION_MAJOR, TOPO_VERSION_MINOR),
        back_version: (TOPO_EARLIEST_MAJOR, TOPO_EARLIEST_MINOR),
        byte_order: port.file_order(),
        head_size,
        off_size,
        with_z: plus.with_z,
        bbox: plus.bbox,
        n_nodes: plus.nodes.len(),
        n_lines: plus.lines.len(),
        n_areas: plus.areas.len(),
        n_isles: plus.isles.len(),
        type_counts: plus.type_counts,
        node_offset,
        line_offset,
        area_offset,
        isle_offset,
        coor_size: plus.coor_size,
    };

    let mut w = PortWriter::new(out, port);
    write_header(&mut w, &header)?;
    debug_assert_eq!(w.position(), base);
    w.write_bytes(&body)?;
    let total = w.position();
    info!(
        nodes = plus.n_nodes(),
        lines = plus.n_lines(),
        areas = plus.n_areas(),
        isles = plus.n_isles(),
        bytes = total,
        "wrote topology"
    );
    Ok(total)
}

/// Reads only the header of a topology file.
pub fn read_header<R: Read>(input: R) -> Result<TopoHeader> {
    let mut r = PortReader::new(input, PortInfo::native()?);
    read_header_from(&mut r)
}

/// Loads a topology file.
///
/// `points` returns the geometry of a line given its type and geometry file
/// offset. The loaded store is checked for consistency before it is
/// returned.
pub fn read_plus<R, P>(input: R, options: BuildOptions, mut points: P) -> Result<Plus>
where
    R: Read,
    P: FnMut(LineType, u64) -> Result<LinePoints>,
{
    let mut r = PortReader::new(input, PortInfo::native()?);
    let head = read_header_from(&mut r)?;
    let mut plus = Plus::new(head.with_z, options);
    plus.bbox = head.bbox;
    plus.coor_size = head.coor_size;

    expect_section(&r, head.node_offset, "node")?;
    for _ in 0..head.n_nodes {
        let node = read_node(&mut r, &head).map_err(truncated)?;
        plus.nodes.push(node);
    }
    expect_section(&r, head.line_offset, "line")?;
    for i in 0..head.n_lines {
        let line = read_line(&mut r, &head, LineId::from_index(i), &mut points)?;
        if let Some(line) = &line {
            plus.type_counts[line.ty.store_code() as usize - 1] += 1;
        }
        plus.lines.push(line);
    }
    expect_section(&r, head.area_offset, "area")?;
    for _ in 0..head.n_areas {
        let area = read_area(&mut r, &head).map_err(truncated)?;
        plus.areas.push(area);
    }
    expect_section(&r, head.isle_offset, "isle")?;
    for _ in 0..head.n_isles {
        let isle = read_isle(&mut r, &head).map_err(truncated)?;
        plus.isles.push(isle);
    }

    plus.node_index = SpatialIndex::read_from(&mut r, head.with_z)?;
    plus.line_index = SpatialIndex::read_from(&mut r, head.with_z)?;
    plus.area_index = SpatialIndex::read_from(&mut r, head.with_z)?;
    plus.isle_index = SpatialIndex::read_from(&mut r, head.with_z)?;

    for (i, slot) in plus.areas.iter_mut().enumerate() {
        if let Some(area) = slot {
            area.bbox = indexed_box(&plus.area_index, AreaId::from_index(i).get(), "area")?;
        }
    }
    for (i, slot) in plus.isles.iter_mut().enumerate() {
        if let Some(isle) = slot {
            isle.bbox = indexed_box(&plus.isle_index, IsleId::from_index(i).get(), "isle")?;
        }
    }

    if plus.type_counts != head.type_counts {
        return Err(Error::CorruptTopology(format!(
            "per-type line counts {:?} disagree with header {:?}",
            plus.type_counts, head.type_counts
        )));
    }
    if let Some(problem) = plus.check().into_iter().next() {
        return Err(Error::CorruptTopology(problem));
    }

    info!(
        nodes = plus.n_nodes(),
        lines = plus.n_lines(),
        areas = plus.n_areas(),
        isles = plus.n_isles(),
        "loaded topology"
    );
    Ok(plus)
}

fn write_header<W: Write>(w: &mut PortWriter<W>, h: &TopoHeader) -> Result<()> {
    w.write_bytes(&[
        h.version.0,
        h.version.1,
        h.back_version.0,
        h.back_version.1,
        h.byte_order.store_code(),
    ])?;
    w.write_long(h.head_size)?;
    w.write_u8(u8::from(h.with_z))?;
    w.write_f64s(&[h.bbox.n, h.bbox.s, h.bbox.e, h.bbox.w, h.bbox.t, h.bbox.b])?;

    // nodes, edges, lines, areas, isles, volumes, holes
    w.write_ints(&[
        count(h.n_nodes)?,
        0,
        count(h.n_lines)?,
        count(h.n_areas)?,
        count(h.n_isles)?,
        0,
        0,
    ])?;
    for n in h.type_counts {
        w.write_int(count(n)?)?;
    }
    // node, edge, line, area, isle, volume, hole sections
    for off in [h.node_offset, 0, h.line_offset, h.area_offset, h.isle_offset, 0, 0] {
        w.write_off(off, h.off_size)?;
    }
    w.write_off(h.coor_size, h.off_size)
}

fn read_header_from<R: Read>(r: &mut PortReader<R>) -> Result<TopoHeader> {
    let mut lead = [0u8; 5];
    r.read_bytes(&mut lead).map_err(truncated)?;
    let [major, minor, back_major, back_minor, order_code] = lead;
    check_version(major, minor, back_major, back_minor)?;
    let byte_order = ByteOrder::from_store_code(order_code)
        .ok_or_else(|| Error::CorruptTopology(format!("unknown byte order code {order_code}")))?;
    let port = r.port().with_file_order(byte_order);
    r.set_port(port);

    let head = (|| -> Result<TopoHeader> {
        let head_size = r.read_long()?;
        let off_size = if head_size >= HEAD_SIZE_LARGE { 8 } else { 4 };
        let with_z = r.read_u8()? != 0;
        let mut b = [0.0f64; 6];
        for v in b.iter_mut() {
            *v = r.read_f64()?;
        }
        let bbox = BoundBox {
            n: b[0],
            s: b[1],
            e: b[2],
            w: b[3],
            t: b[4],
            b: b[5],
        };
        let counts = r.read_ints(7)?;
        let mut type_counts = [0usize; 6];
        for (slot, n) in type_counts.iter_mut().zip(r.read_ints(6)?) {
            *slot = checked_count(n, "type")?;
        }
        let mut offsets = [0u64; 7];
        for off in offsets.iter_mut() {
            *off = r.read_off(off_size)?;
        }
        let coor_size = r.read_off(off_size)?;
        if r.position() != head_size as u64 {
            return Err(Error::CorruptTopology(format!(
                "header size {head_size} but header ends at {}",
                r.position()
            )));
        }
        Ok(TopoHeader {
            version: (major, minor),
            back_version: (back_major, back_minor),
            byte_order,
            head_size,
            off_size,
            with_z,
            bbox,
            n_nodes: checked_count(counts[0], "node")?,
            n_lines: checked_count(counts[2], "line")?,
            n_areas: checked_count(counts[3], "area")?,
            n_isles: checked_count(counts[4], "isle")?,
            type_counts,
            node_offset: offsets[0],
            line_offset: offsets[2],
            area_offset: offsets[3],
            isle_offset: offsets[4],
            coor_size,
        })
    })()
    .map_err(truncated)?;

    debug!(
        version = %format!("{major}.{minor}"),
        ?byte_order,
        off_size = head.off_size,
        with_z = head.with_z,
        "read topology header"
    );
    Ok(head)
}

fn check_version(major: u8, minor: u8, back_major: u8, back_minor: u8) -> Result<()> {
    let current = (TOPO_VERSION_MAJOR, TOPO_VERSION_MINOR);
    if (major, minor) > current {
        if (back_major, back_minor) > current {
            return Err(Error::UnsupportedVersion {
                what: "topology",
                major,
                minor,
            });
        }
        warn!(major, minor, "topology format newer than supported, consider rebuilding");
    }
    if (major, minor) < current {
        return Err(Error::UnsupportedVersion {
            what: "topology",
            major,
            minor,
        });
    }
    Ok(())
}

fn write_node<W: Write>(w: &mut PortWriter<W>, node: &Node, with_z: bool) -> Result<()> {
    w.write_int(count(node.lines.len())?)?;
    for nl in &node.lines {
        w.write_int(nl.line.to_signed())?;
    }
    for nl in &node.lines {
        w.write_f32(nl.angle)?;
    }
    if with_z {
        // edges, reserved
        w.write_int(0)?;
    }
    w.write_f64(node.coord.x)?;
    w.write_f64(node.coord.y)?;
    if with_z {
        w.write_f64(node.coord.z)?;
    }
    Ok(())
}

fn read_node<R: Read>(r: &mut PortReader<R>, head: &TopoHeader) -> Result<Option<Node>> {
    let n = bounded(r.read_int()?, 2 * head.n_lines, "node line")?;
    if n == 0 {
        return Ok(None);
    }
    let signed = r.read_ints(n)?;
    let mut lines = SmallVec::with_capacity(n);
    for s in signed {
        let line = DirectedLine::from_signed(s)
            .ok_or_else(|| Error::CorruptTopology("node lists line 0".to_string()))?;
        lines.push(NodeLine {
            line,
            angle: r.read_f32()?,
        });
    }
    if head.with_z {
        r.read_int()?;
    }
    let x = r.read_f64()?;
    let y = r.read_f64()?;
    let z = if head.with_z { r.read_f64()? } else { 0.0 };
    Ok(Some(Node {
        coord: Point3::new(x, y, z),
        lines,
    }))
}

fn write_line<W: Write>(w: &mut PortWriter<W>, line: &Line, off_size: usize) -> Result<()> {
    w.write_u8(line.ty.store_code())?;
    w.write_off(line.offset, off_size)?;
    match line.topo {
        LineTopo::Line { n1, n2 } => w.write_ints(&[signed_id(n1.get())?, signed_id(n2.get())?]),
        LineTopo::Boundary { n1, n2, left, right } => w.write_ints(&[
            signed_id(n1.get())?,
            signed_id(n2.get())?,
            left.to_signed(),
            right.to_signed(),
        ]),
        // duplicate centroids are stored with a negative area
        LineTopo::Centroid { area, duplicate } => {
            let id = signed_id(area.map_or(0, AreaId::get))?;
            w.write_int(if duplicate { -id } else { id })
        }
        LineTopo::Point | LineTopo::Face | LineTopo::Kernel => Ok(()),
    }
}

fn read_line<R, P>(
    r: &mut PortReader<R>,
    head: &TopoHeader,
    id: LineId,
    points: &mut P,
) -> Result<Option<Line>>
where
    R: Read,
    P: FnMut(LineType, u64) -> Result<LinePoints>,
{
    let code = r.read_u8().map_err(truncated)?;
    if code == 0 {
        return Ok(None);
    }
    let ty = LineType::from_store_code(code)
        .ok_or_else(|| Error::CorruptTopology(format!("line {id} has unknown type code {code}")))?;
    let offset = r.read_off(head.off_size).map_err(truncated)?;
    let node = |n: i32| {
        u32::try_from(n)
            .ok()
            .and_then(NodeId::new)
            .ok_or_else(|| Error::CorruptTopology(format!("line {id} references node {n}")))
    };
    let topo = match ty {
        LineType::Point => LineTopo::Point,
        LineType::Line => {
            let v = r.read_ints(2).map_err(truncated)?;
            LineTopo::Line {
                n1: node(v[0])?,
                n2: node(v[1])?,
            }
        }
        LineType::Boundary => {
            let v = r.read_ints(4).map_err(truncated)?;
            LineTopo::Boundary {
                n1: node(v[0])?,
                n2: node(v[1])?,
                left: AreaRef::from_signed(v[2]),
                right: AreaRef::from_signed(v[3]),
            }
        }
        LineType::Centroid => {
            let a = r.read_int().map_err(truncated)?;
            LineTopo::Centroid {
                area: AreaId::new(a.unsigned_abs()),
                duplicate: a < 0,
            }
        }
        LineType::Face => LineTopo::Face,
        LineType::Kernel => LineTopo::Kernel,
    };
    let pts = points(ty, offset)?;
    if pts.is_empty() {
        return Err(Error::CorruptTopology(format!("line {id} has no geometry")));
    }
    Ok(Some(Line {
        ty,
        topo,
        offset,
        bbox: pts.bbox(),
        points: pts,
    }))
}

fn write_ring<W: Write>(w: &mut PortWriter<W>, ring: &[DirectedLine]) -> Result<()> {
    w.write_int(count(ring.len())?)?;
    for dl in ring {
        w.write_int(dl.to_signed())?;
    }
    Ok(())
}

fn read_ring<R: Read>(r: &mut PortReader<R>, n: usize) -> Result<Vec<DirectedLine>> {
    r.read_ints(n)?
        .into_iter()
        .map(|s| {
            DirectedLine::from_signed(s)
                .ok_or_else(|| Error::CorruptTopology("ring lists line 0".to_string()))
        })
        .collect()
}

fn write_area<W: Write>(w: &mut PortWriter<W>, area: &Area) -> Result<()> {
    write_ring(w, &area.ring)?;
    w.write_int(count(area.isles.len())?)?;
    for isle in &area.isles {
        w.write_int(signed_id(isle.get())?)?;
    }
    w.write_int(signed_id(area.centroid.map_or(0, LineId::get))?)
}

fn read_area<R: Read>(r: &mut PortReader<R>, head: &TopoHeader) -> Result<Option<Area>> {
    let n = bounded(r.read_int()?, head.n_lines, "area ring")?;
    if n == 0 {
        return Ok(None);
    }
    let ring = read_ring(r, n)?;
    let n_isles = bounded(r.read_int()?, head.n_isles, "area isle")?;
    let isles = r
        .read_ints(n_isles)?
        .into_iter()
        .map(|i| {
            u32::try_from(i)
                .ok()
                .and_then(IsleId::new)
                .ok_or_else(|| Error::CorruptTopology(format!("area lists isle {i}")))
        })
        .collect::<Result<Vec<_>>>()?;
    let centroid = r.read_int()?;
    Ok(Some(Area {
        ring,
        isles,
        centroid: u32::try_from(centroid).ok().and_then(LineId::new),
        bbox: BoundBox::empty(),
    }))
}

fn write_isle<W: Write>(w: &mut PortWriter<W>, isle: &Isle) -> Result<()> {
    write_ring(w, &isle.ring)?;
    w.write_int(signed_id(isle.area.map_or(0, AreaId::get))?)
}

fn read_isle<R: Read>(r: &mut PortReader<R>, head: &TopoHeader) -> Result<Option<Isle>> {
    let n = bounded(r.read_int()?, head.n_lines, "isle ring")?;
    if n == 0 {
        return Ok(None);
    }
    let ring = read_ring(r, n)?;
    let area = r.read_int()?;
    Ok(Some(Isle {
        ring,
        area: u32::try_from(area).ok().and_then(AreaId::new),
        bbox: BoundBox::empty(),
    }))
}

fn indexed_box(index: &SpatialIndex, id: u32, what: &str) -> Result<BoundBox> {
    index
        .bbox(id)
        .copied()
        .ok_or_else(|| Error::CorruptIndex(format!("{what} {id} missing from index")))
}

fn expect_section<R: Read>(r: &PortReader<R>, offset: u64, what: &str) -> Result<()> {
    if r.position() != offset {
        return Err(Error::CorruptTopology(format!(
            "{what} section expected at {offset}, found at {}",
            r.position()
        )));
    }
    Ok(())
}

/// A count read from the file that cannot exceed `max`.
fn bounded(n: i32, max: usize, what: &str) -> Result<usize> {
    let n = checked_count(n, what)?;
    if n > max {
        return Err(Error::CorruptTopology(format!("{what} count {n} exceeds {max}")));
    }
    Ok(n)
}

fn count(n: usize) -> Result<i32> {
    i32::try_from(n)
        .map_err(|_| Error::CorruptTopology(format!("count {n} exceeds the file format")))
}

fn signed_id(id: u32) -> Result<i32> {
    count(id as usize)
}

fn truncated(e: Error) -> Error {
    match e {
        Error::Truncated { expected, got } => {
            Error::CorruptTopology(format!("file truncated: expected {expected} bytes, got {got}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    fn square_with_centroid() -> Plus {
        let mut p = Plus::new(false, BuildOptions::default());
        let ring = LinePoints::from_xy(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ]);
        p.add_line(LineType::Boundary, ring, 100).unwrap();
        p.add_line(LineType::Line, LinePoints::from_xy(&[(20.0, 0.0), (30.0, 5.0)]), 200)
            .unwrap();
        p.add_line(LineType::Centroid, LinePoints::from_xy(&[(5.0, 5.0)]), 300)
            .unwrap();
        p.build();
        p
    }

    fn geometry_of(plus: &Plus) -> FxHashMap<u64, LinePoints> {
        plus.lines().map(|(_, l)| (l.offset, l.points.clone())).collect()
    }

    fn round_trip(plus: &Plus, order: ByteOrder) -> Plus {
        let port = PortInfo::new(order).unwrap();
        let mut bytes = Vec::new();
        let n = write_plus(plus, &mut bytes, port).unwrap();
        assert_eq!(n, bytes.len() as u64);
        let geometry = geometry_of(plus);
        read_plus(bytes.as_slice(), BuildOptions::default(), |_, off| {
            geometry
                .get(&off)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("offset {off}")))
        })
        .unwrap()
    }

    #[test]
    fn round_trip_keeps_topology() {
        let plus = square_with_centroid();
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let back = round_trip(&plus, order);
            assert_eq!(back.n_nodes(), plus.n_nodes());
            assert_eq!(back.n_lines(), plus.n_lines());
            assert_eq!(back.n_areas(), plus.n_areas());
            assert_eq!(back.n_isles(), plus.n_isles());
            for (id, line) in plus.lines() {
                let loaded = back.line(id).unwrap();
                assert_eq!(loaded.topo, line.topo);
                assert_eq!(loaded.offset, line.offset);
            }
            for (id, node) in plus.nodes() {
                assert_eq!(back.node(id).unwrap().lines, node.lines);
            }
            assert!(back.check().is_empty());
        }
    }

    #[test]
    fn dead_slots_keep_ids() {
        let mut plus = square_with_centroid();
        plus.del_line(LineId::new(2).unwrap()).unwrap();
        let back = round_trip(&plus, ByteOrder::Big);
        assert!(back.line(LineId::new(2).unwrap()).is_none());
        assert!(back.line(LineId::new(3).unwrap()).is_some());
        assert_eq!(back.line_slots(), 3);
        assert_eq!(back.count_of(LineType::Line), 0);
    }

    #[test]
    fn header_reports_counts() {
        let plus = square_with_centroid();
        let mut bytes = Vec::new();
        write_plus(&plus, &mut bytes, PortInfo::new(ByteOrder::Little).unwrap()).unwrap();
        let head = read_header(bytes.as_slice()).unwrap();
        assert_eq!(head.head_size, HEAD_SIZE_SMALL);
        assert_eq!(head.off_size, 4);
        assert_eq!(head.n_lines, 3);
        assert_eq!(head.type_counts[LineType::Boundary.store_code() as usize - 1], 1);
        assert_eq!(head.node_offset, HEAD_SIZE_SMALL as u64);
    }

    #[test]
    fn old_version_is_rejected() {
        let plus = square_with_centroid();
        let mut bytes = Vec::new();
        write_plus(&plus, &mut bytes, PortInfo::new(ByteOrder::Big).unwrap()).unwrap();
        bytes[1] = 0;
        let err = read_header(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { what: "topology", major: 5, minor: 0 }));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let plus = square_with_centroid();
        let mut bytes = Vec::new();
        write_plus(&plus, &mut bytes, PortInfo::new(ByteOrder::Big).unwrap()).unwrap();
        bytes.truncate(HEAD_SIZE_SMALL as usize + 6);
        let err = read_plus(bytes.as_slice(), BuildOptions::default(), |_, _| Ok(LinePoints::new()))
            .unwrap_err();
        assert!(matches!(err, Error::CorruptTopology(_)));
    }
}
