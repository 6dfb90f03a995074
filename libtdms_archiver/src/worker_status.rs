/// What a worker is busy with, used to style its progress bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Processing,
    Uploading,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStatus {
    pub progress: f32,
    pub cycle: u64,
    pub worker_id: usize,
    pub phase: Phase,
}

impl WorkerStatus {
    pub fn new(progress: f32, cycle: u64, worker_id: usize, phase: Phase) -> Self {
        Self {
            progress,
            cycle,
            worker_id,
            phase,
        }
    }
}
