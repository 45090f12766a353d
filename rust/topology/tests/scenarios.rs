// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Cursor;
use std::path::PathBuf;

use approx::assert_relative_eq;
use grass_lite_topology::topo_file::{read_header, read_plus, write_plus};
use grass_lite_topology::{
    AreaRef, BuildOptions, ByteOrder, Error, LineCats, LineId, LinePoints, LineType, Map, Plus,
    PortInfo,
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("grass-lite-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn memory_map() -> Map<Cursor<Vec<u8>>> {
    let port = PortInfo::new(ByteOrder::Little).unwrap();
    Map::with_storage(Cursor::new(Vec::new()), false, BuildOptions::default(), port, 4).unwrap()
}

/// Four boundaries of a 10 x 10 square; the left one starts 0.05 above the
/// top-left corner.
fn write_offset_square<F>(map: &mut Map<F>) -> Vec<LineId>
where
    F: std::io::Read + std::io::Write + std::io::Seek,
{
    let sides: [&[(f64, f64)]; 4] = [
        &[(0.0, 0.0), (10.0, 0.0)],
        &[(10.0, 0.0), (10.0, 10.0)],
        &[(10.0, 10.0), (0.0, 10.0)],
        &[(0.0, 10.05), (0.0, 0.0)],
    ];
    sides
        .iter()
        .map(|xy| {
            map.write_line(LineType::Boundary, &LinePoints::from_xy(xy), &LineCats::new())
                .unwrap()
        })
        .collect()
}

#[test]
fn snapping_closes_offset_square() {
    let mut map = memory_map();
    let lines = write_offset_square(&mut map);
    assert_eq!(map.counts().areas, 0);

    let report = map.snap_lines(&lines, 0.1).unwrap();
    assert_eq!(report.rewritten, 1);
    assert_eq!(report.deleted, 0);

    assert_eq!(map.counts().areas, 1);
    let area = map.find_area(5.0, 5.0).unwrap();
    assert_relative_eq!(map.area_size(area).unwrap(), 100.0, epsilon = 1e-9);

    let (_, left_side, _) = map.read_line(lines[3]).unwrap();
    assert_eq!(left_side.first().map(|p| (p.x, p.y)), Some((0.0, 10.0)));
    let nodes = map.plus().n_nodes();
    assert_eq!(nodes, 4);
}

#[test]
fn snapped_square_survives_close_and_open() {
    let dir = scratch_dir("square");
    let mut map = Map::create(&dir, false, BuildOptions::default()).unwrap();
    let lines = write_offset_square(&mut map);
    map.snap_lines(&lines, 0.1).unwrap();
    map.write_line(
        LineType::Centroid,
        &LinePoints::from_xy(&[(5.0, 5.0)]),
        &LineCats::single(1, 42),
    )
    .unwrap();
    let counts = map.counts();
    map.close().unwrap();

    let mut map = Map::open(&dir, BuildOptions::default()).unwrap();
    assert_eq!(map.counts(), counts);
    let area = map.find_area(5.0, 5.0).unwrap();
    let centroid = map.plus().area(area).unwrap().centroid.unwrap();
    let (ty, _, cats) = map.read_line(centroid).unwrap();
    assert_eq!(ty, LineType::Centroid);
    assert_eq!(cats.get(1), Some(42));

    let (left, right) = map.get_line_areas(lines[0]).unwrap();
    assert!(left == AreaRef::Area(area) || right == AreaRef::Area(area));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn geometry_without_topology_is_rebuilt_on_open() {
    let dir = scratch_dir("rebuild");
    let mut map = Map::create(&dir, false, BuildOptions::default()).unwrap();
    write_offset_square(&mut map);
    map.close().unwrap();
    std::fs::remove_file(dir.join("topo")).unwrap();

    let map = Map::open(&dir, BuildOptions::default()).unwrap();
    assert_eq!(map.counts().boundaries, 4);
    assert_eq!(map.counts().areas, 0);
    std::fs::remove_dir_all(&dir).unwrap();
}

fn square_plus() -> Plus {
    let mut map = memory_map();
    let lines = write_offset_square(&mut map);
    map.snap_lines(&lines, 0.1).unwrap();
    map.plus().clone()
}

fn geometry_lookup(
    plus: &Plus,
) -> impl FnMut(LineType, u64) -> grass_lite_topology::Result<LinePoints> + '_ {
    move |_, offset| {
        plus.lines()
            .find(|(_, l)| l.offset == offset)
            .map(|(_, l)| l.points.clone())
            .ok_or_else(|| Error::NotFound(format!("offset {offset}")))
    }
}

#[test]
fn topology_file_round_trip() {
    let plus = square_plus();
    for order in [ByteOrder::Big, ByteOrder::Little] {
        let mut bytes = Vec::new();
        write_plus(&plus, &mut bytes, PortInfo::new(order).unwrap()).unwrap();
        let back =
            read_plus(bytes.as_slice(), BuildOptions::default(), geometry_lookup(&plus)).unwrap();

        assert_eq!(back.n_areas(), plus.n_areas());
        assert_eq!(back.n_isles(), plus.n_isles());
        for (id, line) in plus.lines() {
            assert_eq!(back.line(id).unwrap().topo, line.topo);
        }
        for (id, area) in plus.areas() {
            assert_eq!(back.area(id).unwrap().ring, area.ring);
        }
    }
}

#[test]
fn corrupt_index_block_is_reported() {
    let plus = square_plus();
    let port = PortInfo::new(ByteOrder::Big).unwrap();
    let mut bytes = Vec::new();
    write_plus(&plus, &mut bytes, port).unwrap();

    // the node index block starts right after the isle records
    let head = read_header(bytes.as_slice()).unwrap();
    let isle_bytes: usize = (1..=head.n_isles as u32)
        .map(|i| {
            let isle = grass_lite_topology::IsleId::new(i).and_then(|id| plus.isle(id));
            isle.map_or(4, |isle| 8 + 4 * isle.ring.len())
        })
        .sum();
    let start = head.isle_offset as usize + isle_bytes;
    bytes[start..start + 4].copy_from_slice(&port.encode_int(7));

    let err =
        read_plus(bytes.as_slice(), BuildOptions::default(), geometry_lookup(&plus)).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
}

#[test]
fn truncated_index_block_is_reported() {
    let plus = square_plus();
    let mut bytes = Vec::new();
    write_plus(&plus, &mut bytes, PortInfo::new(ByteOrder::Little).unwrap()).unwrap();
    bytes.truncate(bytes.len() - 3);

    let err =
        read_plus(bytes.as_slice(), BuildOptions::default(), geometry_lookup(&plus)).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
}
