// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry (coor) file.
//!
//! The file starts with a small header followed by line records appended in
//! write order. A record is addressed by its byte offset, which is what the
//! topology layer stores per line. Records are never moved: delete clears
//! the alive bit in place and rewrite appends a fresh record.
//!
//! Record layout, all numbers in the file byte order:
//!
//! ```text
//! rtype   u8      store type << 2 | has_cats << 1 | alive
//! n_cats  int     present when has_cats
//! fields  int[n]  present when has_cats
//! cats    int[n]  present when has_cats
//! n_pts   int     absent for point types
//! x       f64[n]
//! y       f64[n]
//! z       f64[n]  present when the file is 3D
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use nalgebra::Point3;
use tracing::{debug, warn};

use crate::cats::LineCats;
use crate::error::{Error, Result};
use crate::geometry::LinePoints;
use crate::keys::LineType;
use crate::portable::{ByteOrder, PortInfo, PortReader, PortWriter, PORT_DOUBLE, PORT_INT};

pub const COOR_VERSION_MAJOR: u8 = 5;
pub const COOR_VERSION_MINOR: u8 = 1;
pub const COOR_EARLIEST_MAJOR: u8 = 5;
pub const COOR_EARLIEST_MINOR: u8 = 1;

const ALIVE_BIT: u8 = 0x01;
const CATS_BIT: u8 = 0x02;

/// Header of a geometry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoorHeader {
    pub version: (u8, u8),
    pub back_version: (u8, u8),
    pub byte_order: ByteOrder,
    /// Width of the size field and of offsets into this file (4 or 8).
    pub off_size: usize,
    pub head_size: u64,
    pub with_z: bool,
    /// Total file size including the header.
    pub size: u64,
}

impl CoorHeader {
    fn encoded_len(off_size: usize) -> u64 {
        // 4 version bytes, order, off width, head size, with_z, size
        (4 + 1 + 1 + 4 + 1 + off_size) as u64
    }
}

/// A decoded line record.
#[derive(Debug, Clone, PartialEq)]
pub struct CoorRecord {
    pub ty: LineType,
    pub alive: bool,
    pub points: LinePoints,
    pub cats: LineCats,
}

/// Geometry file over any seekable byte store.
#[derive(Debug)]
pub struct CoorFile<F> {
    file: F,
    port: PortInfo,
    header: CoorHeader,
}

impl<F: Read + Write + Seek> CoorFile<F> {
    /// Starts a new, empty geometry file. Existing content of `file` is
    /// overwritten from offset 0.
    pub fn create(file: F, with_z: bool, port: PortInfo, off_size: usize) -> Result<Self> {
        if off_size != 4 && off_size != 8 {
            return Err(Error::InvalidGeometry(format!(
                "offset width must be 4 or 8, not {off_size}"
            )));
        }
        let head_size = CoorHeader::encoded_len(off_size);
        let header = CoorHeader {
            version: (COOR_VERSION_MAJOR, COOR_VERSION_MINOR),
            back_version: (COOR_EARLIEST_MAJOR, COOR_EARLIEST_MINOR),
            byte_order: port.file_order(),
            off_size,
            head_size,
            with_z,
            size: head_size,
        };
        let mut coor = Self { file, port, header };
        coor.flush_header()?;
        Ok(coor)
    }

    /// Opens an existing geometry file and validates its header.
    pub fn open(mut file: F) -> Result<Self> {
        file.seek(SeekFrom::Start(0))?;
        let native = PortInfo::native()?;
        let mut r = PortReader::new(&mut file, native);

        let mut lead = [0u8; 6];
        r.read_bytes(&mut lead).map_err(|e| header_error(e, "header truncated"))?;
        let [major, minor, back_major, back_minor, order_code, off_size] = lead;
        check_version(major, minor, back_major, back_minor)?;

        let byte_order =
            ByteOrder::from_store_code(order_code).ok_or_else(|| Error::CorruptGeometry {
                offset: 4,
                reason: format!("unknown byte order code {order_code}"),
            })?;
        let off_size = usize::from(off_size);
        if off_size != 4 && off_size != 8 {
            return Err(Error::CorruptGeometry {
                offset: 5,
                reason: format!("offset width {off_size}"),
            });
        }
        let port = native.with_file_order(byte_order);
        r.set_port(port);

        let head_size = r.read_long().map_err(|e| header_error(e, "header truncated"))?;
        let with_z = r.read_u8().map_err(|e| header_error(e, "header truncated"))? != 0;
        let size = r
            .read_off(off_size)
            .map_err(|e| header_error(e, "header truncated"))?;
        let head_size = u64::try_from(head_size).map_err(|_| Error::CorruptGeometry {
            offset: 6,
            reason: format!("negative header size {head_size}"),
        })?;
        let actual = file.seek(SeekFrom::End(0))?;
        let size = if actual != size && actual >= head_size {
            warn!(
                recorded = size,
                actual, "geometry file size differs from header, using actual size"
            );
            actual
        } else {
            size
        };
        if head_size < CoorHeader::encoded_len(off_size) || size < head_size {
            return Err(Error::CorruptGeometry {
                offset: 6,
                reason: format!("header size {head_size} with file size {size}"),
            });
        }

        debug!(
            version = %format!("{major}.{minor}"),
            ?byte_order,
            off_size,
            with_z,
            size,
            "opened geometry file"
        );
        Ok(Self {
            file,
            port,
            header: CoorHeader {
                version: (major, minor),
                back_version: (back_major, back_minor),
                byte_order,
                off_size,
                head_size,
                with_z,
                size,
            },
        })
    }

    pub fn header(&self) -> &CoorHeader {
        &self.header
    }

    pub fn port(&self) -> &PortInfo {
        &self.port
    }

    pub fn with_z(&self) -> bool {
        self.header.with_z
    }

    /// Current file size, header included.
    pub fn size(&self) -> u64 {
        self.header.size
    }

    pub fn into_inner(self) -> F {
        self.file
    }

    /// Appends a live record and returns its offset.
    pub fn write_record(
        &mut self,
        ty: LineType,
        points: &LinePoints,
        cats: &LineCats,
    ) -> Result<u64> {
        if points.is_empty() {
            return Err(Error::InvalidGeometry(format!("{ty} without points")));
        }
        let offset = self.header.size;
        // fail before writing anything the header cannot address
        self.port.encode_off(offset, self.header.off_size)?;

        let mut rtype = ty.store_code() << 2 | ALIVE_BIT;
        if !cats.is_empty() {
            rtype |= CATS_BIT;
        }
        let pts = if ty.is_point_like() {
            &points.as_slice()[..1]
        } else {
            points.as_slice()
        };

        let mut w = PortWriter::new(Vec::new(), self.port);
        w.write_u8(rtype)?;
        if !cats.is_empty() {
            w.write_int(count_i32(cats.len())?)?;
            let (fields, values): (Vec<i32>, Vec<i32>) = cats.iter().unzip();
            w.write_ints(&fields)?;
            w.write_ints(&values)?;
        }
        if !ty.is_point_like() {
            w.write_int(count_i32(pts.len())?)?;
        }
        let xs: Vec<f64> = pts.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = pts.iter().map(|p| p.y).collect();
        w.write_f64s(&xs)?;
        w.write_f64s(&ys)?;
        if self.header.with_z {
            let zs: Vec<f64> = pts.iter().map(|p| p.z).collect();
            w.write_f64s(&zs)?;
        }
        let record = w.into_inner();

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&record)?;
        self.header.size = offset + record.len() as u64;
        debug!(offset, %ty, n_points = pts.len(), "wrote geometry record");
        Ok(offset)
    }

    /// Reads the record at `offset`, dead or alive.
    pub fn read_record(&mut self, offset: u64) -> Result<CoorRecord> {
        self.read_record_at(offset).map(|(rec, _)| rec)
    }

    /// Clears the alive bit of the record at `offset`.
    pub fn delete_record(&mut self, offset: u64) -> Result<()> {
        self.set_alive(offset, false)
    }

    /// Sets the alive bit of the record at `offset` again.
    pub fn restore_record(&mut self, offset: u64) -> Result<()> {
        self.set_alive(offset, true)
    }

    /// Every record in file order with its offset, dead ones included.
    pub fn records(&mut self) -> Result<Vec<(u64, CoorRecord)>> {
        let mut out = Vec::new();
        let mut offset = self.header.head_size;
        while offset < self.header.size {
            let (rec, next) = self.read_record_at(offset)?;
            out.push((offset, rec));
            offset = next;
        }
        Ok(out)
    }

    /// Rewrites the header at offset 0 and flushes the file.
    pub fn flush_header(&mut self) -> Result<()> {
        let h = self.header;
        self.file.seek(SeekFrom::Start(0))?;
        let mut w = PortWriter::new(&mut self.file, self.port);
        w.write_bytes(&[
            h.version.0,
            h.version.1,
            h.back_version.0,
            h.back_version.1,
            h.byte_order.store_code(),
            h.off_size as u8,
        ])?;
        w.write_long(count_i32(h.head_size as usize)?)?;
        w.write_u8(u8::from(h.with_z))?;
        w.write_off(h.size, h.off_size)?;
        self.file.flush()?;
        Ok(())
    }

    fn set_alive(&mut self, offset: u64, alive: bool) -> Result<()> {
        self.check_offset(offset)?;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut r = PortReader::new(&mut self.file, self.port);
        let rtype = r.read_u8().map_err(|e| record_error(e, offset))?;
        let rtype = if alive { rtype | ALIVE_BIT } else { rtype & !ALIVE_BIT };
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&[rtype])?;
        debug!(offset, alive, "updated geometry record state");
        Ok(())
    }

    fn check_offset(&self, offset: u64) -> Result<()> {
        if offset < self.header.head_size || offset >= self.header.size {
            return Err(Error::CorruptGeometry {
                offset,
                reason: format!(
                    "offset outside records [{}, {})",
                    self.header.head_size, self.header.size
                ),
            });
        }
        Ok(())
    }

    /// Decodes one record and returns it with the offset of the next one.
    fn read_record_at(&mut self, offset: u64) -> Result<(CoorRecord, u64)> {
        self.check_offset(offset)?;
        let size = self.header.size;
        let with_z = self.header.with_z;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut r = PortReader::new(&mut self.file, self.port);

        let rtype = r.read_u8().map_err(|e| record_error(e, offset))?;
        let store = (rtype >> 2) & 0x0f;
        let ty = LineType::from_store_code(store).ok_or_else(|| Error::CorruptGeometry {
            offset,
            reason: format!("unknown store type {store}"),
        })?;
        let alive = rtype & ALIVE_BIT != 0;

        let remaining = |pos: u64| size.saturating_sub(offset + pos);
        let mut cats = LineCats::new();
        if rtype & CATS_BIT != 0 {
            let n = r.read_int().map_err(|e| record_error(e, offset))?;
            let n = record_count(n, offset, "category")?;
            if (2 * n * PORT_INT) as u64 > remaining(r.position()) {
                return Err(Error::CorruptGeometry {
                    offset,
                    reason: format!("{n} categories exceed the file"),
                });
            }
            let fields = r.read_ints(n).map_err(|e| record_error(e, offset))?;
            let values = r.read_ints(n).map_err(|e| record_error(e, offset))?;
            for (field, cat) in fields.into_iter().zip(values) {
                cats.add(field, cat);
            }
        }

        let n_points = if ty.is_point_like() {
            1
        } else {
            let n = r.read_int().map_err(|e| record_error(e, offset))?;
            record_count(n, offset, "point")?
        };
        let dims = if with_z { 3 } else { 2 };
        if (n_points * dims * PORT_DOUBLE) as u64 > remaining(r.position()) {
            return Err(Error::CorruptGeometry {
                offset,
                reason: format!("{n_points} points exceed the file"),
            });
        }

        let mut coords = vec![0.0f64; n_points * dims];
        for c in coords.iter_mut() {
            *c = r.read_f64().map_err(|e| record_error(e, offset))?;
        }
        let points = LinePoints::from_vec(
            (0..n_points)
                .map(|i| {
                    let z = if with_z { coords[2 * n_points + i] } else { 0.0 };
                    Point3::new(coords[i], coords[n_points + i], z)
                })
                .collect(),
        );
        let next = offset + r.position();

        Ok((
            CoorRecord {
                ty,
                alive,
                points,
                cats,
            },
            next,
        ))
    }
}

fn check_version(major: u8, minor: u8, back_major: u8, back_minor: u8) -> Result<()> {
    let current = (COOR_VERSION_MAJOR, COOR_VERSION_MINOR);
    if (major, minor) > current {
        if (back_major, back_minor) > current {
            return Err(Error::UnsupportedVersion {
                what: "geometry",
                major,
                minor,
            });
        }
        warn!(major, minor, "geometry format newer than supported, reading anyway");
    }
    if (major, minor) < (COOR_EARLIEST_MAJOR, COOR_EARLIEST_MINOR) {
        return Err(Error::UnsupportedVersion {
            what: "geometry",
            major,
            minor,
        });
    }
    Ok(())
}

fn record_count(n: i32, offset: u64, what: &str) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::CorruptGeometry {
        offset,
        reason: format!("negative {what} count {n}"),
    })
}

fn count_i32(n: usize) -> Result<i32> {
    i32::try_from(n)
        .map_err(|_| Error::InvalidGeometry(format!("count {n} exceeds the file format")))
}

fn record_error(e: Error, offset: u64) -> Error {
    match e {
        Error::Truncated { expected, got } => Error::CorruptGeometry {
            offset,
            reason: format!("record truncated: expected {expected} bytes, got {got}"),
        },
        other => other,
    }
}

fn header_error(e: Error, reason: &str) -> Error {
    match e {
        Error::Truncated { .. } => Error::CorruptGeometry {
            offset: 0,
            reason: reason.to_string(),
        },
        other => other,
    }
}
