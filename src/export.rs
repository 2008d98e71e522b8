use crate::data::PointCloud;
use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Write the cloud as ASCII PLY, silently overwriting `path`.
///
/// Coordinates are truncated to integers; the vertex count in the header
/// matches the number of coordinate lines that follow it.
pub fn write_ply(cloud: &PointCloud, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "comment created by {}", env!("CARGO_PKG_NAME"))?;
    writeln!(writer, "comment (yet another point ccloud viewer)")?;
    writeln!(writer, "element vertex {}", cloud.points.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "end_header")?;

    for point in &cloud.points {
        writeln!(writer, "{} {} {}", point.x as i32, point.y as i32, point.z as i32)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{build_point_cloud, DepthBuffer, COLS, ROWS};
    use nalgebra::Point3;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn exact_file_layout() {
        let cloud = PointCloud {
            points: vec![Point3::new(1.9, -2.9, 300.0), Point3::new(-0.4, 0.4, 42.5)],
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("out.ply");
        write_ply(&cloud, &path).unwrap();

        let expected = "\
ply
format ascii 1.0
comment created by angkor
comment (yet another point ccloud viewer)
element vertex 2
property float x
property float y
property float z
end_header
1 -2 300
0 0 42
";
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn empty_cloud_has_zero_vertices_and_no_body() {
        let cloud = PointCloud { points: vec![] };

        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.ply");
        write_ply(&cloud, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("element vertex 0\n"));
        assert!(contents.ends_with("end_header\n"));
    }

    #[test]
    fn header_count_matches_body_lines() {
        let mut buffer = DepthBuffer::new();
        let mut raw = vec![1000u16; crate::data::RAW_WIDTH * crate::data::RAW_HEIGHT];
        raw[0] = 0; // one discarded sample
        buffer.fill_from_raw(&raw);
        let cloud = build_point_cloud(&buffer);

        let dir = tempdir().unwrap();
        let path = dir.path().join("full.ply");
        write_ply(&cloud, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let expected_count = ROWS * COLS - 1;
        assert!(contents.contains(&format!("element vertex {expected_count}\n")));

        let body_lines = contents
            .split("end_header\n")
            .nth(1)
            .unwrap()
            .lines()
            .count();
        assert_eq!(body_lines, expected_count);
    }

    #[test]
    fn existing_file_is_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.ply");
        fs::write(&path, "stale contents").unwrap();

        let cloud = PointCloud { points: vec![] };
        write_ply(&cloud, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("ply\n"));
        assert!(!contents.contains("stale"));
    }

    #[test]
    fn unwritable_path_reports_an_error() {
        let cloud = PointCloud { points: vec![] };
        let result = write_ply(&cloud, Path::new("no-such-dir/out.ply"));
        assert!(result.is_err());
    }

    #[test]
    fn repeated_export_of_same_buffer_is_identical() {
        let mut buffer = DepthBuffer::new();
        let raw = vec![700u16; crate::data::RAW_WIDTH * crate::data::RAW_HEIGHT];
        buffer.fill_from_raw(&raw);
        let cloud = build_point_cloud(&buffer);

        let dir = tempdir().unwrap();
        let first = dir.path().join("a.ply");
        let second = dir.path().join("b.ply");
        write_ply(&cloud, &first).unwrap();
        write_ply(&cloud, &second).unwrap();

        assert_eq!(
            fs::read_to_string(&first).unwrap(),
            fs::read_to_string(&second).unwrap()
        );
    }
}
