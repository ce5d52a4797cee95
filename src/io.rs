//! Flat-file dataset loading, the distance cache, and placement output.
//!
//! A dataset directory holds `adjacency.csv`, `data.tsv`, an optional `names.tsv`,
//! and a regenerable `distance.csv` cache.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::algorithms::PartitionState;
use crate::dataset::{Dataset, Unit, UnitRecord};
use crate::distance::DistanceTable;
use crate::error::{Error, Result};
use crate::graph::Graph;

pub const ADJACENCY_FILE: &str = "adjacency.csv";
pub const DATA_FILE: &str = "data.tsv";
pub const NAMES_FILE: &str = "names.tsv";
pub const DISTANCE_FILE: &str = "distance.csv";

/// Column of `data.tsv` holding unit codes.
const CODE_COLUMN: &str = "Region";
/// Summary row of `data.tsv`, not a unit.
const TOTAL_ROW: &str = "Total";

/// Load the dataset stored in `dir`, named after the directory.
///
/// Distances come from `distance.csv` when it is present and agrees with the
/// adjacency; otherwise they are recomputed and the cache is rewritten.
pub fn load_dataset(dir: &Path) -> Result<Dataset> {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string());

    let (metric_names, rows) = read_data(&dir.join(DATA_FILE))?;
    let mut adjacency = read_adjacency(&dir.join(ADJACENCY_FILE))?;
    let mut names = read_names(&dir.join(NAMES_FILE))?;

    let records: Vec<UnitRecord> = rows
        .into_iter()
        .map(|(code, metrics)| UnitRecord {
            name: names.remove(&code),
            adjacent: adjacency.remove(&code).unwrap_or_default(),
            code,
            metrics,
        })
        .collect();
    if !adjacency.is_empty() {
        warn!(dataset = %name, ignored = adjacency.len(), "adjacency rows without data ignored");
    }

    let cache_path = dir.join(DISTANCE_FILE);
    let mut recomputed = false;
    let dataset = Dataset::from_records_with(name, metric_names, records, |graph, units| {
        match read_distance_cache(&cache_path, units, graph) {
            Ok(Some(table)) => return table,
            Ok(None) => info!(path = %cache_path.display(), "no distance cache, computing distances"),
            Err(err) => warn!(error = %err, "discarding distance cache"),
        }
        recomputed = true;
        DistanceTable::compute(graph)
    })?;

    if recomputed {
        if let Err(err) = write_distance_cache(&cache_path, &dataset) {
            warn!(error = %err, "failed to write distance cache");
        }
    }

    Ok(dataset)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::io(path, source))
}

/// Metric names, then `(code, metrics)` per unit in file order.
fn read_data(path: &Path) -> Result<(Vec<String>, Vec<(String, Vec<f64>)>)> {
    let content = read_file(path)?;
    let mut lines = content.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());

    let header: Vec<&str> = match lines.next() {
        Some((_, line)) => line.split('\t').map(str::trim).collect(),
        None => return Err(Error::DataIntegrity(format!("{} is empty", path.display()))),
    };
    let code_column = header
        .iter()
        .position(|column| *column == CODE_COLUMN)
        .ok_or_else(|| {
            Error::DataIntegrity(format!("{} has no '{CODE_COLUMN}' column", path.display()))
        })?;
    let metric_names: Vec<String> = header
        .iter()
        .enumerate()
        .filter(|(column, _)| *column != code_column)
        .map(|(_, name)| name.to_string())
        .collect();

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
        if cells.len() != header.len() {
            return Err(Error::DataIntegrity(format!(
                "{}:{}: expected {} columns, found {}",
                path.display(),
                line_no + 1,
                header.len(),
                cells.len()
            )));
        }
        let code = cells[code_column];
        if code == TOTAL_ROW {
            continue;
        }
        let metrics = cells
            .iter()
            .enumerate()
            .filter(|(column, _)| *column != code_column)
            .map(|(_, cell)| {
                parse_metric(cell).ok_or_else(|| {
                    Error::DataIntegrity(format!(
                        "{}:{}: bad metric value '{cell}' for '{code}'",
                        path.display(),
                        line_no + 1
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push((code.to_string(), metrics));
    }

    Ok((metric_names, rows))
}

/// Parse a count that may be quoted and carry thousands separators, e.g. `"1,234"`.
fn parse_metric(cell: &str) -> Option<f64> {
    let digits: String = cell.trim_matches('"').chars().filter(|c| *c != ',').collect();
    let value: f64 = digits.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn read_adjacency(path: &Path) -> Result<FxHashMap<String, Vec<String>>> {
    let content = read_file(path)?;
    let mut adjacency = FxHashMap::default();
    for line in content.lines() {
        let mut cells = line.split(',').map(str::trim).filter(|cell| !cell.is_empty());
        let Some(code) = cells.next() else {
            continue;
        };
        let neighbors: Vec<String> = cells.map(str::to_string).collect();
        if adjacency.insert(code.to_string(), neighbors).is_some() {
            return Err(Error::DataIntegrity(format!(
                "{}: unit '{code}' listed twice",
                path.display()
            )));
        }
    }
    Ok(adjacency)
}

/// Display names keyed by code; a missing file means every unit goes by its code.
fn read_names(path: &Path) -> Result<FxHashMap<String, String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(FxHashMap::default()),
        Err(err) => return Err(Error::io(path, err)),
    };
    Ok(content
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(code, name)| (code.trim().to_string(), name.trim().to_string()))
        .collect())
}

/// Read a distance cache written by [`write_distance_cache`].
///
/// Returns `Ok(None)` when there is no cache. The cache must list exactly `units` in
/// order and hold the symmetric shortest hop counts of `graph`; anything else is a
/// `DataIntegrity` error and the caller should recompute.
pub fn read_distance_cache(path: &Path, units: &[Unit], graph: &Graph) -> Result<Option<DistanceTable>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::io(path, err)),
    };
    let stale = |what: String| Error::DataIntegrity(format!("{}: {what}", path.display()));

    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let header: Vec<&str> = lines.next().unwrap_or_default().split(',').collect();
    let listed = header.iter().skip(1).copied();
    if header.first() != Some(&"name")
        || header.len() != units.len() + 1
        || !listed.eq(units.iter().map(|unit| unit.code.as_str()))
    {
        return Err(stale("header does not match the dataset's units".to_string()));
    }

    let mut rows = Vec::with_capacity(units.len());
    for (index, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').collect();
        let expected = units.get(index).map(|unit| unit.code.as_str());
        if cells.first().copied() != expected || cells.len() != units.len() + 1 {
            return Err(stale(format!("row {} is out of place or malformed", index + 1)));
        }
        let row = cells[1..]
            .iter()
            .map(|cell| match cell.trim() {
                "" => Some(0),
                cell => cell.parse::<u32>().ok().filter(|hops| *hops > 0),
            })
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(|| stale(format!("row {} has a bad distance", index + 1)))?;
        rows.push(row);
    }
    if rows.len() != units.len() {
        return Err(stale(format!("{} rows for {} units", rows.len(), units.len())));
    }

    let table = DistanceTable::from_rows(rows).ok_or_else(|| stale("ragged rows".to_string()))?;
    if let Some(unit) = (0..table.len()).find(|&unit| table.get(unit, unit).is_some()) {
        return Err(stale(format!("'{}' has a distance to itself", units[unit].code)));
    }
    if let Some((from, to)) = first_wrong_distance(&table, graph) {
        return Err(stale(format!(
            "distance from '{}' to '{}' is not the shortest hop count",
            units[from].code, units[to].code
        )));
    }

    Ok(Some(table))
}

/// First pair whose cached distance is not a symmetric shortest hop count.
///
/// Shortest paths are the only table where every entry is one more than the nearest
/// neighbor's entry toward the same target (the target itself counting as 0), and an
/// entry is empty exactly when no neighbor has one.
fn first_wrong_distance(table: &DistanceTable, graph: &Graph) -> Option<(usize, usize)> {
    (0..table.len()).find_map(|to| {
        (0..table.len()).filter(|&from| from != to).find_map(|from| {
            let expected = graph
                .neighbors(from)
                .filter_map(|next| if next == to { Some(0) } else { table.get(next, to) })
                .min()
                .map(|hops| hops + 1);
            let cached = table.get(from, to);
            (cached != expected || cached != table.get(to, from)).then_some((from, to))
        })
    })
}

/// Write the dataset's distance table as CSV: a `name,<codes>` header, then one row per
/// unit with empty cells for itself and unreachable units.
pub fn write_distance_cache(path: &Path, dataset: &Dataset) -> Result<()> {
    let write = || -> std::io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        write!(file, "name")?;
        for unit in dataset.units() {
            write!(file, ",{}", unit.code)?;
        }
        writeln!(file)?;

        let table = dataset.distance_table();
        for (from, unit) in dataset.units().iter().enumerate() {
            write!(file, "{}", unit.code)?;
            for hops in table.row(from) {
                match hops {
                    0 => write!(file, ",")?,
                    hops => write!(file, ",{hops}")?,
                }
            }
            writeln!(file)?;
        }
        file.flush()
    };
    write().map_err(|source| Error::io(path, source))?;
    info!(path = %path.display(), units = dataset.len(), "distance cache written");
    Ok(())
}

/// Write the placement of every unit to a file, in dataset order.
pub fn write_partition_data_to_file(state: &PartitionState<'_>, file_path: &Path) -> Result<()> {
    let write = || -> std::io::Result<()> {
        let mut file = BufWriter::new(File::create(file_path)?);
        for (unit, group) in state.dataset().units().iter().zip(state.placements()) {
            match group {
                0 => writeln!(file, "{} => unplaced", unit.code)?,
                group => writeln!(file, "{} => group {group}", unit.code)?,
            }
        }
        file.flush()
    };
    write().map_err(|source| Error::io(file_path, source))
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;
    use crate::algorithms::PartitionState;
    use crate::error::{Error, Result};
    use crate::io::*;

    fn create_mock_file(dir: &Path, filename: &str, content: &str) -> PathBuf {
        let file_path = dir.join(filename);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    fn testdata_copy(dir: &Path) -> PathBuf {
        let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join("test");
        let target = dir.join("test");
        fs::create_dir(&target).unwrap();
        for file in [ADJACENCY_FILE, DATA_FILE, NAMES_FILE] {
            fs::copy(source.join(file), target.join(file)).unwrap();
        }
        target
    }

    #[test]
    fn test_load_dataset() -> Result<()> {
        // Arrange
        let temp_dir = tempdir().unwrap();
        let dir = testdata_copy(temp_dir.path());

        // Act
        let dataset = load_dataset(&dir)?;

        // Assert
        assert_eq!(dataset.name(), "test");
        assert_eq!(dataset.len(), 10);
        assert_eq!(dataset.metric_names(), ["T1".to_string()]);
        let d = dataset.lookup("D").unwrap();
        let a = dataset.lookup("A").unwrap();
        assert_eq!(dataset.unit(d).name, "D_Name");
        assert_eq!(dataset.unit(d).metric(0), 3.0);
        assert_eq!(dataset.distances_from(d).collect::<Vec<_>>(), vec![(a, 1)]);
        assert!(dir.join(DISTANCE_FILE).exists());

        Ok(())
    }

    #[test]
    fn test_distance_cache_is_reused_and_idempotent() {
        // Arrange
        let temp_dir = tempdir().unwrap();
        let dir = testdata_copy(temp_dir.path());
        let first = load_dataset(&dir).unwrap();
        let written = fs::read_to_string(dir.join(DISTANCE_FILE)).unwrap();

        // Act
        let cached = load_dataset(&dir).unwrap();
        fs::remove_file(dir.join(DISTANCE_FILE)).unwrap();
        let recomputed = load_dataset(&dir).unwrap();

        // Assert
        assert_eq!(first.distance_table(), cached.distance_table());
        assert_eq!(first.distance_table(), recomputed.distance_table());
        assert_eq!(written, fs::read_to_string(dir.join(DISTANCE_FILE)).unwrap());
        assert!(written.starts_with("name,A,B,C,D,E,F,G,H,I,J\n"));
        assert!(written.contains("\nD,1,,,,,,,,,\n"));
    }

    #[test]
    fn test_corrupt_cache_is_recomputed() {
        let temp_dir = tempdir().unwrap();
        let dir = testdata_copy(temp_dir.path());
        let expected = load_dataset(&dir).unwrap();

        create_mock_file(&dir, DISTANCE_FILE, "name,A,B\nA,,x\n");
        let reloaded = load_dataset(&dir).unwrap();

        assert_eq!(expected.distance_table(), reloaded.distance_table());
    }

    #[test]
    fn test_cache_disagreeing_with_adjacency_is_rejected() {
        let temp_dir = tempdir().unwrap();
        create_mock_file(temp_dir.path(), ADJACENCY_FILE, "X,Y\nY,X\n");
        create_mock_file(temp_dir.path(), DATA_FILE, "Region\tT1\nX\t1\nY\t2\n");
        let dataset = load_dataset(temp_dir.path()).unwrap();
        let cache = create_mock_file(temp_dir.path(), DISTANCE_FILE, "name,X,Y\nX,,2\nY,2,\n");

        let result = read_distance_cache(&cache, dataset.units(), dataset.graph());

        assert!(matches!(result, Err(Error::DataIntegrity(_))));
    }

    /// Overwrite one cell of a cache written by `write_distance_cache`.
    fn edit_cache_cell(dir: &Path, row: &str, column: &str, value: &str) {
        let path = dir.join(DISTANCE_FILE);
        let content = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<Vec<String>> = content
            .lines()
            .map(|line| line.split(',').map(str::to_string).collect())
            .collect();
        let column = lines[0].iter().position(|code| code == column).unwrap();
        let row = lines.iter_mut().find(|cells| cells[0] == row).unwrap();
        row[column] = value.to_string();
        let rewritten: Vec<String> = lines.iter().map(|cells| cells.join(",")).collect();
        create_mock_file(dir, DISTANCE_FILE, &(rewritten.join("\n") + "\n"));
    }

    #[test]
    fn test_cache_with_wrong_distances_is_recomputed() {
        // Arrange
        let temp_dir = tempdir().unwrap();
        let dir = testdata_copy(temp_dir.path());
        let fresh = load_dataset(&dir).unwrap();
        edit_cache_cell(&dir, "B", "G", "9");
        edit_cache_cell(&dir, "J", "B", "1");

        // Act
        let cached = read_distance_cache(&dir.join(DISTANCE_FILE), fresh.units(), fresh.graph());
        let reloaded = load_dataset(&dir).unwrap();

        // Assert
        assert!(matches!(cached, Err(Error::DataIntegrity(_))));
        assert_eq!(fresh.distance_table(), reloaded.distance_table());
        let (b, g) = (reloaded.lookup("B").unwrap(), reloaded.lookup("G").unwrap());
        assert_eq!(reloaded.distance(b, g), Some(2));
    }

    #[test]
    fn test_cache_rejects_each_kind_of_wrong_entry() {
        // Path X - Y - Z plus an isolated W.
        let temp_dir = tempdir().unwrap();
        create_mock_file(temp_dir.path(), ADJACENCY_FILE, "X,Y\nY,X,Z\nZ,Y\nW\n");
        create_mock_file(temp_dir.path(), DATA_FILE, "Region\tT1\nX\t1\nY\t1\nZ\t1\nW\t1\n");
        let dataset = load_dataset(temp_dir.path()).unwrap();
        let check = |content: &str| {
            let cache = create_mock_file(temp_dir.path(), DISTANCE_FILE, content);
            read_distance_cache(&cache, dataset.units(), dataset.graph())
        };

        let exact = check("name,X,Y,Z,W\nX,,1,2,\nY,1,,1,\nZ,2,1,,\nW,,,,\n").unwrap();
        assert_eq!(exact.as_ref(), Some(dataset.distance_table()));

        // Too long, but symmetric.
        assert!(check("name,X,Y,Z,W\nX,,1,3,\nY,1,,1,\nZ,3,1,,\nW,,,,\n").is_err());
        // Asymmetric.
        assert!(check("name,X,Y,Z,W\nX,,1,2,\nY,1,,1,\nZ,1,1,,\nW,,,,\n").is_err());
        // Reachable pair left empty.
        assert!(check("name,X,Y,Z,W\nX,,1,,\nY,1,,1,\nZ,,1,,\nW,,,,\n").is_err());
        // Distance into another component.
        assert!(check("name,X,Y,Z,W\nX,,1,2,4\nY,1,,1,\nZ,2,1,,\nW,4,,,\n").is_err());
    }

    #[test]
    fn test_read_data_rows() {
        // Arrange
        let temp_dir = tempdir().unwrap();
        create_mock_file(temp_dir.path(), ADJACENCY_FILE, "P,Q\nQ,P\n");
        create_mock_file(
            temp_dir.path(),
            DATA_FILE,
            "Region\tPop\tArea\nP\t\"1,234\"\t5\nQ\t10\t2,000\nTotal\t1244\t2005\n",
        );

        // Act
        let dataset = load_dataset(temp_dir.path()).unwrap();

        // Assert
        assert_eq!(dataset.len(), 2);
        let p = dataset.lookup("P").unwrap();
        let q = dataset.lookup("Q").unwrap();
        assert_eq!(dataset.unit(p).metrics, vec![1234.0, 5.0]);
        assert_eq!(dataset.unit(q).metrics, vec![10.0, 2000.0]);
        assert_eq!(dataset.unit(q).name, "Q");
        assert!(dataset.lookup("Total").is_none());
    }

    #[test]
    fn test_bad_inputs() {
        let temp_dir = tempdir().unwrap();
        assert!(matches!(load_dataset(temp_dir.path()), Err(Error::Io { .. })));

        create_mock_file(temp_dir.path(), ADJACENCY_FILE, "P,Q\n");
        create_mock_file(temp_dir.path(), DATA_FILE, "Region\tT1\nP\t1\n");
        assert!(matches!(load_dataset(temp_dir.path()), Err(Error::DataIntegrity(_))));

        create_mock_file(temp_dir.path(), ADJACENCY_FILE, "P\n");
        create_mock_file(temp_dir.path(), DATA_FILE, "Region\tT1\nP\tmany\n");
        assert!(matches!(load_dataset(temp_dir.path()), Err(Error::DataIntegrity(_))));

        create_mock_file(temp_dir.path(), DATA_FILE, "Code\tT1\nP\t1\n");
        assert!(matches!(load_dataset(temp_dir.path()), Err(Error::DataIntegrity(_))));
    }

    #[test]
    fn test_write_partition_data_to_file() {
        // Arrange
        let temp_dir = tempdir().unwrap();
        let dir = testdata_copy(temp_dir.path());
        let dataset = load_dataset(&dir).unwrap();
        let mut state = PartitionState::new(&dataset, 2, &"T1".into()).unwrap();
        state.add_to_group(dataset.lookup("J").unwrap(), 2).unwrap();
        let out = temp_dir.path().join("placements.txt");

        // Act
        write_partition_data_to_file(&state, &out).unwrap();

        // Assert
        let content = fs::read_to_string(&out).unwrap();
        assert!(content.starts_with("A => unplaced\n"));
        assert!(content.ends_with("J => group 2\n"));
        assert_eq!(content.lines().count(), 10);
    }
}
