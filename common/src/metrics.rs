use metrics::{describe_gauge, gauge};

pub fn component_info_metric(name: &'static str) {
    static NAME: &str = "pulsecal_component_info";

    describe_gauge!(NAME, "Basic information about the component");

    let git_rev = option_env!("GIT_VERSION").unwrap_or("unknown");
    gauge!(NAME, "component" => name, "git_version" => git_rev).set(1);
}

pub mod names {
    use const_format::concatcp;

    pub const METRIC_NAME_PREFIX: &str = "pulsecal_";

    pub const FAILURES: &str = concatcp!(METRIC_NAME_PREFIX, "failures");
    pub const WAVEFORMS_PROCESSED: &str = concatcp!(METRIC_NAME_PREFIX, "waveforms_processed");
    pub const WAVEFORMS_ACCEPTED: &str = concatcp!(METRIC_NAME_PREFIX, "waveforms_accepted");
    pub const WAVEFORMS_REJECTED: &str = concatcp!(METRIC_NAME_PREFIX, "waveforms_rejected");
    pub const FITS_PERFORMED: &str = concatcp!(METRIC_NAME_PREFIX, "fits_performed");
}

pub mod fit_status {
    // Label building function
    pub fn get_label(status: &impl ToString) -> (&'static str, String) {
        ("fit_status", status.to_string())
    }
}

pub mod rejections {
    // Label building function
    pub fn get_label(reason: &impl ToString) -> (&'static str, String) {
        ("reason", reason.to_string())
    }
}

pub mod failures {
    #[derive(Debug, Clone, Eq, Hash, PartialEq)]
    pub enum FailureKind {
        FileWriteFailed,
        FitFailed,
        InputParseFailed,
        TemplateLoadFailed,
        TemplateWriteFailed,
    }

    // Label building function
    pub fn get_label(failure_kind: FailureKind) -> (&'static str, &'static str) {
        (
            "failure_kind",
            match failure_kind {
                FailureKind::FileWriteFailed => "file_write_failed",
                FailureKind::FitFailed => "fit_failed",
                FailureKind::InputParseFailed => "input_parse_failed",
                FailureKind::TemplateLoadFailed => "template_load_failed",
                FailureKind::TemplateWriteFailed => "template_write_failed",
            },
        )
    }
}
