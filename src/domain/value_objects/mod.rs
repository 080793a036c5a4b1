pub mod backend_kind;
pub mod job_status;
pub mod output_style;
pub mod path_id;
pub mod resource_hints;
pub mod tags;

pub use backend_kind::BackendKind;
pub use job_status::{JobStatus, QueuePhase, QueueState};
pub use output_style::{OutputStyle, ProgressView};
pub use resource_hints::{parse_mem_megabytes, BeginTime, Gpus, ResourceHints};
pub use tags::Tags;
