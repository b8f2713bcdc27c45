//! Checkpoint serialization: whole-engine snapshots on disk.
//!
//! Snapshots are JSON documents written to a distinct temporary name and
//! renamed into place, so a failed write never leaves partial state
//! visible. The program under test is not serialized; it is rebound by
//! name when the checkpoint is read back.

use crate::cache::StateCache;
use crate::config::SearchConfig;
use crate::coverage::CoverageStats;
use crate::error::{SearchError, SearchResult};
use crate::orchestration::{ChoiceLearningStats, ChoiceOrchestrator};
use crate::schedule::Schedule;
use crate::stats::SearchStats;
use crate::task::TaskManager;
use actra_runtime::Runtime;
use actra_solver::{SolverStats, VarAllocator};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a resumed run needs; the scheduler is rebuilt around it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub config: SearchConfig,
    /// Program name, used to rebind handlers on load.
    pub program: String,
    pub iter: usize,
    pub start_iter: usize,
    pub depth: usize,
    pub choice_depth: usize,
    pub backtrack_depth: usize,
    pub done: bool,
    pub result: String,
    pub schedule: Schedule,
    pub runtime: Runtime,
    pub tasks: TaskManager,
    pub cache: StateCache,
    pub coverage: CoverageStats,
    pub learning: ChoiceLearningStats,
    pub stats: SearchStats,
    pub solver_stats: SolverStats,
    pub orchestrator: ChoiceOrchestrator,
    pub vars: VarAllocator,
}

/// Atomic write: serialize next to the target, then rename over it.
pub fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> SearchResult<()> {
    let json = serde_json::to_vec(checkpoint).map_err(|source| SearchError::CheckpointFormat {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("tmp");
    let io_err = |source| SearchError::CheckpointIo {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&json).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err)?;
    info!(
        path = %path.display(),
        bytes = json.len(),
        "checkpoint written"
    );
    Ok(())
}

pub fn read_checkpoint(path: &Path) -> SearchResult<Checkpoint> {
    let bytes = fs::read(path).map_err(|source| SearchError::CheckpointIo {
        path: path.to_path_buf(),
        source,
    })?;
    let checkpoint =
        serde_json::from_slice(&bytes).map_err(|source| SearchError::CheckpointFormat {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), "checkpoint read");
    Ok(checkpoint)
}

/// File name of the whole-engine checkpoint for this process.
pub fn current_file_name() -> String {
    format!("current_pid{}.out", std::process::id())
}

/// File name of an individually serialized backtrack point.
pub fn backtrack_file_name(prefix: &str, depth: usize, choice_depth: usize, task: usize) -> String {
    format!(
        "{}_d{}_cd{}_task{}_pid{}.out",
        prefix,
        depth,
        choice_depth,
        task,
        std::process::id()
    )
}

/// Append-only log of emitted backtrack files.
pub struct BacktrackWriter {
    path: PathBuf,
}

impl BacktrackWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("backtracks.log"),
        }
    }

    pub fn log(
        &self,
        file: &Path,
        prefix_coverage: f64,
        depth: usize,
        choice_depth: usize,
    ) -> SearchResult<()> {
        let io_err = |source| SearchError::CheckpointIo {
            path: self.path.clone(),
            source,
        };
        let mut log = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        writeln!(
            log,
            "{}\tcoverage={:.12}\tstep={}\tcd={}",
            file.display(),
            prefix_coverage,
            depth,
            choice_depth
        )
        .map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskOrchestrationMode;

    fn sample() -> Checkpoint {
        let config = SearchConfig::default();
        Checkpoint {
            program: "sample".into(),
            iter: 3,
            start_iter: 1,
            depth: 7,
            choice_depth: 9,
            backtrack_depth: 2,
            done: false,
            result: "incomplete".into(),
            schedule: Schedule::new(),
            runtime: Runtime::new(false),
            tasks: TaskManager::new(TaskOrchestrationMode::DepthFirst, 0, 0.1),
            cache: StateCache::new(config.state_caching),
            coverage: CoverageStats::new(),
            learning: ChoiceLearningStats::default(),
            stats: SearchStats::new(),
            solver_stats: SolverStats::default(),
            orchestrator: ChoiceOrchestrator::new(config.choice_orchestration, 0, 0.1),
            vars: VarAllocator::new(),
            config,
        }
    }

    #[test]
    fn write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(current_file_name());
        let cp = sample();
        write_checkpoint(&path, &cp).unwrap();
        let back = read_checkpoint(&path).unwrap();
        assert_eq!(back.iter, cp.iter);
        assert_eq!(back.depth, cp.depth);
        assert_eq!(back.program, cp.program);
        // no temporary file left behind
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn read_missing_file_reports_path() {
        let err = read_checkpoint(Path::new("/nonexistent/cp.out")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cp.out"));
    }

    #[test]
    fn backtrack_file_names_carry_coordinates() {
        let name = backtrack_file_name("backtrack", 4, 6, 2);
        assert!(name.starts_with("backtrack_d4_cd6_task2_pid"));
        assert!(name.ends_with(".out"));
    }
}
