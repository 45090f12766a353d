// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vector map: a geometry file plus the topology built over it.
//!
//! On disk a map is a directory holding a `coor` geometry file and a `topo`
//! topology file. Opening a map loads the topology when it matches the
//! geometry file and rebuilds it otherwise. Every edit goes to the geometry
//! file first and then updates the topology incrementally; [`Map::close`]
//! writes the topology back.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::arena::{validate_points, Plus};
use crate::cats::LineCats;
use crate::config::BuildOptions;
use crate::construction::BuildReport;
use crate::coor::CoorFile;
use crate::error::{Error, Result};
use crate::geometry::LinePoints;
use crate::keys::*;
use crate::portable::{ByteOrder, PortInfo};
use crate::snap::{log_report, plan_snap, SnapChange, SnapReport};
use crate::topo_file::{read_header, read_plus, write_plus};

pub const COOR_FILE: &str = "coor";
pub const TOPO_FILE: &str = "topo";

/// Primitive counts of a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapCounts {
    pub nodes: usize,
    pub lines: usize,
    pub areas: usize,
    pub isles: usize,
    pub points: usize,
    pub linestrings: usize,
    pub boundaries: usize,
    pub centroids: usize,
    pub faces: usize,
    pub kernels: usize,
}

/// An open vector map over geometry storage `F`.
#[derive(Debug)]
pub struct Map<F = File> {
    dir: Option<PathBuf>,
    coor: CoorFile<F>,
    plus: Plus,
}

impl Map<File> {
    /// Creates an empty map in `dir`, writing in the host's preferred byte
    /// order with 4-byte offsets.
    pub fn create(dir: impl AsRef<Path>, with_z: bool, options: BuildOptions) -> Result<Self> {
        Self::create_with(dir, with_z, options, PortInfo::native()?.file_order(), 4)
    }

    /// Creates an empty map with an explicit file byte order and offset width.
    pub fn create_with(
        dir: impl AsRef<Path>,
        with_z: bool,
        options: BuildOptions,
        file_order: ByteOrder,
        off_size: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dir.join(COOR_FILE))?;
        // a stale topology file would not match the new geometry
        match fs::remove_file(dir.join(TOPO_FILE)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        let port = PortInfo::new(file_order)?;
        let mut map = Self::with_storage(file, with_z, options, port, off_size)?;
        map.dir = Some(dir.to_path_buf());
        info!(dir = %dir.display(), with_z, "created map");
        Ok(map)
    }

    /// Opens the map in `dir`.
    ///
    /// The topology file is used when its recorded geometry size matches the
    /// geometry file; otherwise topology is rebuilt from the geometry.
    pub fn open(dir: impl AsRef<Path>, options: BuildOptions) -> Result<Self> {
        let dir = dir.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(dir.join(COOR_FILE))?;
        let mut coor = CoorFile::open(file)?;

        let topo = match fs::read(dir.join(TOPO_FILE)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let plus = match topo {
            Some(bytes) => {
                let head = read_header(bytes.as_slice())?;
                if head.with_z != coor.with_z() {
                    return Err(Error::CorruptTopology(format!(
                        "topology is {}D, geometry is {}D",
                        if head.with_z { 3 } else { 2 },
                        if coor.with_z() { 3 } else { 2 }
                    )));
                }
                if head.coor_size == coor.size() {
                    let plus = read_plus(bytes.as_slice(), options, |ty, offset| {
                        let rec = coor.read_record(offset)?;
                        if rec.ty != ty || !rec.alive {
                            return Err(Error::CorruptTopology(format!(
                                "topology expects a live {ty} at offset {offset}"
                            )));
                        }
                        Ok(rec.points)
                    })?;
                    debug!(dir = %dir.display(), "loaded topology file");
                    Some(plus)
                } else {
                    info!(
                        dir = %dir.display(),
                        expected = head.coor_size,
                        found = coor.size(),
                        "topology is stale, rebuilding"
                    );
                    None
                }
            }
            None => {
                info!(dir = %dir.display(), "no topology file, building");
                None
            }
        };

        let plus = match plus {
            Some(plus) => plus,
            None => build_plus(&mut coor, options)?.0,
        };
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            coor,
            plus,
        })
    }

    /// Writes the geometry header and the topology file, then closes the map.
    pub fn close(mut self) -> Result<()> {
        self.coor.flush_header()?;
        self.plus.set_coor_size(self.coor.size());
        if let Some(dir) = &self.dir {
            let mut out = BufWriter::new(File::create(dir.join(TOPO_FILE))?);
            write_plus(&self.plus, &mut out, *self.coor.port())?;
            out.flush()?;
            info!(dir = %dir.display(), "closed map");
        }
        Ok(())
    }
}

impl<F: Read + Write + Seek> Map<F> {
    /// Creates an empty map over `storage`, overwriting it.
    pub fn with_storage(
        storage: F,
        with_z: bool,
        options: BuildOptions,
        port: PortInfo,
        off_size: usize,
    ) -> Result<Self> {
        let coor = CoorFile::create(storage, with_z, port, off_size)?;
        let mut plus = Plus::new(with_z, options);
        plus.set_coor_size(coor.size());
        Ok(Self {
            dir: None,
            coor,
            plus,
        })
    }

    /// Opens a geometry file held in `storage` and builds its topology.
    pub fn from_storage(storage: F, options: BuildOptions) -> Result<Self> {
        let mut coor = CoorFile::open(storage)?;
        let (plus, _) = build_plus(&mut coor, options)?;
        Ok(Self {
            dir: None,
            coor,
            plus,
        })
    }

    /// Rebuilds the whole topology from the geometry file.
    pub fn build(&mut self) -> Result<BuildReport> {
        let (plus, report) = build_plus(&mut self.coor, *self.plus.options())?;
        self.plus = plus;
        Ok(report)
    }

    /// Writes the topology of this map to `out`.
    pub fn write_topo<W: Write>(&self, out: W) -> Result<u64> {
        write_plus(&self.plus, out, *self.coor.port())
    }

    /// Flushes the geometry header and returns the storage.
    pub fn into_storage(mut self) -> Result<F> {
        self.coor.flush_header()?;
        Ok(self.coor.into_inner())
    }

    pub fn plus(&self) -> &Plus {
        &self.plus
    }

    pub fn with_z(&self) -> bool {
        self.plus.with_z()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Geometry, categories and type of a live line.
    pub fn read_line(&mut self, id: LineId) -> Result<(LineType, LinePoints, LineCats)> {
        let offset = self.plus.live_line(id)?.offset;
        let rec = self.coor.read_record(offset)?;
        if !rec.alive {
            return Err(Error::DeadLine(id));
        }
        Ok((rec.ty, rec.points, rec.cats))
    }

    /// Appends a line and updates the topology around it.
    pub fn write_line(
        &mut self,
        ty: LineType,
        points: &LinePoints,
        cats: &LineCats,
    ) -> Result<LineId> {
        validate_points(ty, points)?;
        let offset = self.coor.write_record(ty, points, cats)?;
        let (id, _) = self.plus.add_line_and_rebuild(ty, points.clone(), offset)?;
        self.plus.set_coor_size(self.coor.size());
        debug!(line = %id, offset, "wrote line");
        Ok(id)
    }

    /// Replaces a live line's record, keeping its id.
    ///
    /// The new record is appended first; the old one is marked dead only
    /// once the append succeeded.
    pub fn rewrite_line(
        &mut self,
        id: LineId,
        ty: LineType,
        points: &LinePoints,
        cats: &LineCats,
    ) -> Result<()> {
        validate_points(ty, points)?;
        let old = self.plus.live_line(id)?.offset;
        let offset = self.coor.write_record(ty, points, cats)?;
        if let Err(e) = self.coor.delete_record(old) {
            // the appended copy must not survive next to the live original
            let _ = self.coor.delete_record(offset);
            return Err(e);
        }
        self.plus.replace_line_and_rebuild(id, ty, points.clone(), offset)?;
        self.plus.set_coor_size(self.coor.size());
        debug!(line = %id, old, offset, "rewrote line");
        Ok(())
    }

    /// Deletes a live line and updates the topology around it.
    pub fn delete_line(&mut self, id: LineId) -> Result<()> {
        let offset = self.plus.live_line(id)?.offset;
        self.coor.delete_record(offset)?;
        self.plus.del_line_and_rebuild(id)?;
        debug!(line = %id, offset, "deleted line");
        Ok(())
    }

    /// Left and right of a line; both [`AreaRef::None`] unless it is a
    /// built boundary.
    pub fn get_line_areas(&self, id: LineId) -> Result<(AreaRef, AreaRef)> {
        let line = self.plus.live_line(id)?;
        Ok((line.side(Side::Left), line.side(Side::Right)))
    }

    pub fn find_area(&self, x: f64, y: f64) -> Option<AreaId> {
        self.plus.find_area(x, y)
    }

    /// Snaps `lines` to each other with tolerance `threshold`.
    ///
    /// Changed lines are rewritten in the geometry file under their old ids;
    /// lines that collapse to one point are deleted.
    pub fn snap_lines(&mut self, lines: &[LineId], threshold: f64) -> Result<SnapReport> {
        let plan = plan_snap(&self.plus, lines, threshold)?;
        for edit in plan.edits {
            match edit.change {
                SnapChange::Rewrite(points) => {
                    let (ty, _, cats) = self.read_line(edit.line)?;
                    self.rewrite_line(edit.line, ty, &points, &cats)?;
                }
                SnapChange::Delete => self.delete_line(edit.line)?,
            }
        }
        log_report(&plan.report, threshold);
        Ok(plan.report)
    }

    pub fn line_type(&self, id: LineId) -> Result<LineType> {
        Ok(self.plus.live_line(id)?.ty)
    }

    /// Start and end node of a linear line; `None` for point types.
    pub fn line_nodes(&self, id: LineId) -> Result<Option<(NodeId, NodeId)>> {
        Ok(self.plus.live_line(id)?.nodes())
    }

    pub fn area_points(&self, id: AreaId) -> Option<LinePoints> {
        self.plus.area_points(id)
    }

    pub fn area_size(&self, id: AreaId) -> Option<f64> {
        self.plus.area_size(id)
    }

    pub fn isle_points(&self, id: IsleId) -> Option<LinePoints> {
        self.plus.isle_points(id)
    }

    pub fn counts(&self) -> MapCounts {
        let p = &self.plus;
        MapCounts {
            nodes: p.n_nodes(),
            lines: p.n_lines(),
            areas: p.n_areas(),
            isles: p.n_isles(),
            points: p.count_of(LineType::Point),
            linestrings: p.count_of(LineType::Line),
            boundaries: p.count_of(LineType::Boundary),
            centroids: p.count_of(LineType::Centroid),
            faces: p.count_of(LineType::Face),
            kernels: p.count_of(LineType::Kernel),
        }
    }
}

/// Builds topology over every live record of `coor`.
fn build_plus<F: Read + Write + Seek>(
    coor: &mut CoorFile<F>,
    options: BuildOptions,
) -> Result<(Plus, BuildReport)> {
    let records = coor.records()?;
    let mut plus = Plus::new(coor.with_z(), options);
    let report = plus.build_from(
        records
            .into_iter()
            .filter(|(_, rec)| rec.alive)
            .map(|(offset, rec)| (rec.ty, rec.points, offset)),
    )?;
    plus.set_coor_size(coor.size());
    Ok((plus, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::Cell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn memory_map() -> Map<Cursor<Vec<u8>>> {
        let port = PortInfo::new(ByteOrder::Big).unwrap();
        Map::with_storage(Cursor::new(Vec::new()), false, BuildOptions::default(), port, 4).unwrap()
    }

    fn square() -> LinePoints {
        LinePoints::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)])
    }

    #[test]
    fn write_builds_area_incrementally() {
        let mut map = memory_map();
        let b = map.write_line(LineType::Boundary, &square(), &LineCats::new()).unwrap();
        let c = map
            .write_line(
                LineType::Centroid,
                &LinePoints::from_xy(&[(5.0, 5.0)]),
                &LineCats::single(1, 1),
            )
            .unwrap();

        let area = map.find_area(5.0, 5.0).unwrap();
        assert_relative_eq!(map.area_size(area).unwrap(), 100.0);
        assert_eq!(map.plus().area(area).unwrap().centroid, Some(c));
        let (left, right) = map.get_line_areas(b).unwrap();
        assert!(left == AreaRef::Area(area) || right == AreaRef::Area(area));

        let (ty, _, cats) = map.read_line(c).unwrap();
        assert_eq!(ty, LineType::Centroid);
        assert_eq!(cats.get(1), Some(1));
    }

    /// Storage that refuses writes past its current end while `refuse` is set.
    #[derive(Debug)]
    struct FullDisk {
        inner: Cursor<Vec<u8>>,
        refuse: Rc<Cell<bool>>,
    }

    impl Read for FullDisk {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let at_end = self.inner.position() >= self.inner.get_ref().len() as u64;
            if self.refuse.get() && at_end {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for FullDisk {
        fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn failed_rewrite_keeps_the_old_record_live() {
        let refuse = Rc::new(Cell::new(false));
        let storage = FullDisk {
            inner: Cursor::new(Vec::new()),
            refuse: Rc::clone(&refuse),
        };
        let port = PortInfo::new(ByteOrder::Little).unwrap();
        let mut map = Map::with_storage(storage, false, BuildOptions::default(), port, 4).unwrap();
        let b = map.write_line(LineType::Boundary, &square(), &LineCats::new()).unwrap();

        refuse.set(true);
        let bigger = LinePoints::from_xy(&[
            (0.0, 0.0),
            (20.0, 0.0),
            (20.0, 20.0),
            (0.0, 20.0),
            (0.0, 0.0),
        ]);
        let err = map.rewrite_line(b, LineType::Boundary, &bigger, &LineCats::new()).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "{err}");
        refuse.set(false);

        let (_, points, _) = map.read_line(b).unwrap();
        assert_eq!(points, square());

        let storage = map.into_storage().unwrap();
        let reopened = Map::from_storage(storage, BuildOptions::default()).unwrap();
        assert_eq!(reopened.counts().boundaries, 1);
        assert_eq!(reopened.counts().areas, 1);
    }

    #[test]
    fn delete_marks_record_dead() {
        let mut map = memory_map();
        let b = map.write_line(LineType::Boundary, &square(), &LineCats::new()).unwrap();
        map.delete_line(b).unwrap();
        assert_eq!(map.counts().areas, 0);
        assert!(matches!(map.read_line(b), Err(Error::DeadLine(_))));
        assert!(matches!(map.line_type(b), Err(Error::DeadLine(_))));
    }

    #[test]
    fn rewrite_keeps_id_and_appends() {
        let mut map = memory_map();
        let id = map
            .write_line(
                LineType::Line,
                &LinePoints::from_xy(&[(0.0, 0.0), (1.0, 0.0)]),
                &LineCats::new(),
            )
            .unwrap();
        let before = map.plus().line(id).unwrap().offset;
        let longer = LinePoints::from_xy(&[(0.0, 0.0), (2.0, 0.0)]);
        map.rewrite_line(id, LineType::Line, &longer, &LineCats::new())
            .unwrap();
        let after = map.plus().line(id).unwrap().offset;
        assert!(after > before);
        let (_, pts, _) = map.read_line(id).unwrap();
        assert_eq!(pts.last().unwrap().x, 2.0);
    }

    #[test]
    fn reopening_storage_rebuilds_same_topology() {
        let mut map = memory_map();
        map.write_line(LineType::Boundary, &square(), &LineCats::new()).unwrap();
        map.write_line(LineType::Centroid, &LinePoints::from_xy(&[(5.0, 5.0)]), &LineCats::new())
            .unwrap();
        let counts = map.counts();
        let storage = map.into_storage().unwrap();
        let reopened = Map::from_storage(storage, BuildOptions::default()).unwrap();
        assert_eq!(reopened.counts(), counts);
    }

    #[test]
    fn invalid_geometry_leaves_file_untouched() {
        let mut map = memory_map();
        let size = map.coor.size();
        let err = map
            .write_line(LineType::Line, &LinePoints::from_xy(&[(0.0, 0.0)]), &LineCats::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
        assert_eq!(map.coor.size(), size);
    }

    #[test]
    fn close_and_open_from_disk() {
        let dir = std::env::temp_dir().join(format!("grass-lite-map-{}", std::process::id()));
        let mut map = Map::create(&dir, false, BuildOptions::default()).unwrap();
        let b = map.write_line(LineType::Boundary, &square(), &LineCats::new()).unwrap();
        let counts = map.counts();
        map.close().unwrap();

        let reopened = Map::open(&dir, BuildOptions::default()).unwrap();
        assert_eq!(reopened.counts(), counts);
        assert_eq!(reopened.line_type(b).unwrap(), LineType::Boundary);
        assert!(reopened.plus().check().is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }
}
