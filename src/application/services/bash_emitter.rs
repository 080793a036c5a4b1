//! Per-job bash fragment emitter.
//!
//! Grounded on `cmd_queue/serial_queue.py::BashJob.finalize_text` and
//! `cmd_queue/util/util_bash.py::bash_json_dump`.

use std::path::Path;

use crate::domain::entities::Job;
use crate::infrastructure::status_io::{bash_json_dump, JsonFmtPart};

fn indent(lines: &[String]) -> String {
    lines.iter().map(|l| format!("    {l}")).collect::<Vec<_>>().join("\n")
}

/// Extra hook lines a caller can splice into the three outcome branches,
/// e.g. to increment a worker's pass/fail/skipped counters.
#[derive(Debug, Default, Clone)]
pub struct JobHooks {
    pub on_pass: Vec<String>,
    pub on_fail: Vec<String>,
    pub on_skip: Vec<String>,
}

/// Emits the bash fragment for a single job.
/// `dep_pass_fpaths` must be supplied in the same order as `job.depends`
/// and already resolved by the caller (the graph builder / queue own
/// name resolution, not this emitter).
pub fn emit_job_fragment(
    job: &Job,
    dep_pass_fpaths: &[std::path::PathBuf],
    with_status: bool,
    with_guards: bool,
    hooks: &JobHooks,
) -> String {
    let mut prefix: Vec<String> = Vec::new();
    let mut body: Vec<String> = Vec::new();
    let mut suffix: Vec<String> = Vec::new();

    if with_status {
        prefix.push("# Ensure job status directory".to_string());
        prefix.push(format!("mkdir -p {}", parent_display(&job.stat_fpath())));
    }

    let had_conditions = with_status && !dep_pass_fpaths.is_empty();
    if had_conditions {
        let condition = dep_pass_fpaths
            .iter()
            .map(|p| format!("[ -f {} ]", p.display()))
            .collect::<Vec<_>>()
            .join(" && ");
        prefix.push(format!("if {condition}; then"));
    }

    if with_status {
        body.push("# before_command:".to_string());
        let pre_parts = pre_status_parts(job);
        body.push("# Mark job as running".to_string());
        body.push(bash_json_dump(&pre_parts, &job.stat_fpath()));
    }

    if with_guards && !job.bookkeeper {
        if job.log {
            body.push("set -o pipefail".to_string());
        }
        body.push("# Disable exit-on-error, enable command echo".to_string());
        body.push("set +e -x".to_string());
    }

    if with_status {
        body.push("# ********".to_string());
        body.push("# command:".to_string());
    }
    if job.log && with_status {
        body.push(format!("({}) 2>&1 | tee {}", job.command, job.log_fpath().display()));
    } else {
        body.push(job.command.clone());
    }
    if with_status {
        body.push("# ********".to_string());
        body.push("# after_command:".to_string());
    }

    if with_guards {
        body.push("# Capture job return code, disable command echo, enable exit-on-error".to_string());
        body.push("{ RETURN_CODE=$? ; set +x -e; } 2>/dev/null".to_string());
        if job.log {
            body.push("set +o pipefail".to_string());
        }
    } else if with_status {
        body.push("# Capture job return code".to_string());
        body.push("RETURN_CODE=$?".to_string());
    }

    let mut script = if had_conditions {
        suffix.push("else".to_string());
        if !hooks.on_skip.is_empty() {
            suffix.push(indent(&hooks.on_skip));
        }
        suffix.push("    RETURN_CODE=126".to_string());
        suffix.push("fi".to_string());
        let mut combined = prefix;
        combined.push(indent(&body));
        combined.extend(suffix);
        combined
    } else {
        let mut combined = prefix;
        combined.extend(body);
        combined.extend(suffix);
        combined
    };

    if with_status {
        let post_parts = post_status_parts(job);
        let dump_post_status = bash_json_dump(&post_parts, &job.stat_fpath());

        let mut on_pass = vec![
            format!("mkdir -p {}", parent_display(&job.pass_fpath())),
            format!("printf \"pass\" > {}", job.pass_fpath().display()),
        ];
        on_pass.extend(hooks.on_pass.clone());
        let mut on_fail = vec![
            format!("mkdir -p {}", parent_display(&job.fail_fpath())),
            format!("printf \"fail\" > {}", job.fail_fpath().display()),
        ];
        on_fail.extend(hooks.on_fail.clone());

        script.push("# Mark job as stopped".to_string());
        script.push(dump_post_status);
        script.push("if [[ \"$RETURN_CODE\" == \"0\" ]]; then".to_string());
        script.push(indent(&on_pass));
        script.push("elif [[ \"$RETURN_CODE\" == \"126\" ]]; then".to_string());
        script.push("    :".to_string());
        script.push("else".to_string());
        script.push(indent(&on_fail));
        script.push("fi".to_string());
    }

    script.join("\n")
}

fn pre_status_parts(job: &Job) -> Vec<JsonFmtPart> {
    let mut parts = vec![
        JsonFmtPart::new("ret", "%s", "null"),
        JsonFmtPart::new("name", "\"%s\"", job.name.clone()),
    ];
    if job.log {
        parts.push(JsonFmtPart::new("logs", "\"%s\"", job.log_fpath().display().to_string()));
    }
    parts
}

fn post_status_parts(job: &Job) -> Vec<JsonFmtPart> {
    let mut parts = vec![
        JsonFmtPart::new("ret", "%s", "$RETURN_CODE"),
        JsonFmtPart::new("name", "\"%s\"", job.name.clone()),
    ];
    if job.log {
        parts.push(JsonFmtPart::new("logs", "\"%s\"", job.log_fpath().display().to_string()));
    }
    parts
}

fn parent_display(p: &Path) -> String {
    p.parent().map(|d| d.display().to_string()).unwrap_or_else(|| ".".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::serial_emitter::{FAIL_HOOK, PASS_HOOK, SKIP_HOOK};
    use std::path::PathBuf;

    fn root() -> PathBuf {
        PathBuf::from("/tmp/jobweaver-test")
    }

    #[test]
    fn fragment_without_dependencies_has_no_skip_branch() {
        let job = Job::new("build", "echo hi", &root());
        let text = emit_job_fragment(&job, &[], true, true, &JobHooks::default());
        assert!(!text.contains("RETURN_CODE=126"));
        assert!(text.contains("echo hi"));
        assert!(text.contains("set +e -x"));
    }

    #[test]
    fn fragment_with_dependencies_gates_on_pass_files() {
        let dep_pass = vec![PathBuf::from("/tmp/jobweaver-test/dep/dep.pass")];
        let job = Job::new("build", "echo hi", &root());
        let text = emit_job_fragment(&job, &dep_pass, true, true, &JobHooks::default());
        assert!(text.contains("if [ -f /tmp/jobweaver-test/dep/dep.pass ]; then"));
        assert!(text.contains("RETURN_CODE=126"));
    }

    #[test]
    fn skip_sentinel_hits_neither_pass_nor_fail_branch() {
        let dep_pass = vec![PathBuf::from("/tmp/jobweaver-test/dep/dep.pass")];
        let job = Job::new("build", "echo hi", &root());
        let hooks = JobHooks {
            on_pass: vec![PASS_HOOK.to_string()],
            on_fail: vec![FAIL_HOOK.to_string()],
            on_skip: vec![SKIP_HOOK.to_string()],
        };
        let text = emit_job_fragment(&job, &dep_pass, true, true, &hooks);
        assert!(text.contains("elif [[ \"$RETURN_CODE\" == \"126\" ]]; then"));
        let elif_idx = text.find("elif [[ \"$RETURN_CODE\" == \"126\" ]]; then").unwrap();
        let else_idx = text[elif_idx..].find("\nelse\n").map(|i| i + elif_idx).unwrap();
        let skip_arm = &text[elif_idx..else_idx];
        assert!(!skip_arm.contains(FAIL_HOOK));
        assert!(!skip_arm.contains(PASS_HOOK));
    }

    #[test]
    fn logged_job_tees_output_and_toggles_pipefail() {
        let mut job = Job::new("build", "echo hi", &root());
        job.log = true;
        let text = emit_job_fragment(&job, &[], true, true, &JobHooks::default());
        assert!(text.contains("2>&1 | tee"));
        assert!(text.contains("set -o pipefail"));
        assert!(text.contains("set +o pipefail"));
    }

    #[test]
    fn hooks_are_spliced_into_outcome_branches() {
        let job = Job::new("build", "echo hi", &root());
        let hooks = JobHooks {
            on_pass: vec!["(( _CMD_QUEUE_NUM_PASSED += 1 )) || true".to_string()],
            on_fail: vec![],
            on_skip: vec!["echo skipped".to_string()],
        };
        let dep_pass = vec![PathBuf::from("/tmp/jobweaver-test/dep/dep.pass")];
        let text = emit_job_fragment(&job, &dep_pass, true, true, &hooks);
        assert!(text.contains("_CMD_QUEUE_NUM_PASSED"));
        assert!(text.contains("echo skipped"));
    }
}
