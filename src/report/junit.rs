//! JUnit XML output.
//!
//! Renders [`TestSuites`] in the layout CI dashboards expect:
//!
//! ```text
//! <testsuites>
//!   <testsuite name=".." tests=".." failures=".." skipped=".." time="..">
//!     <testcase name=".." time="..">
//!       <failure>..</failure>
//!       <skipped message=".."/>
//!     </testcase>
//!   </testsuite>
//! </testsuites>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{TestCase, TestSuite, TestSuites};
use crate::error::{Result, StepGraphError};

#[derive(Serialize)]
#[serde(rename = "testsuites")]
struct JunitSuites<'a> {
    #[serde(rename = "testsuite")]
    suites: Vec<JunitSuite<'a>>,
}

#[derive(Serialize)]
struct JunitSuite<'a> {
    #[serde(rename = "@name")]
    name: &'a str,
    #[serde(rename = "@tests")]
    tests: usize,
    #[serde(rename = "@failures")]
    failures: usize,
    #[serde(rename = "@skipped")]
    skipped: usize,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(rename = "testcase")]
    cases: Vec<JunitCase<'a>>,
}

#[derive(Serialize)]
struct JunitCase<'a> {
    #[serde(rename = "@name")]
    name: &'a str,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<JunitFailure<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<JunitSkip<'a>>,
}

#[derive(Serialize)]
struct JunitFailure<'a> {
    #[serde(rename = "$text")]
    output: &'a str,
}

#[derive(Serialize)]
struct JunitSkip<'a> {
    #[serde(rename = "@message")]
    message: &'a str,
}

impl<'a> From<&'a TestSuite> for JunitSuite<'a> {
    fn from(suite: &'a TestSuite) -> Self {
        Self {
            name: &suite.name,
            tests: suite.num_tests,
            failures: suite.num_failed,
            skipped: suite.num_skipped,
            time: suite.duration.as_secs_f64(),
            cases: suite.test_cases.iter().map(JunitCase::from).collect(),
        }
    }
}

impl<'a> From<&'a TestCase> for JunitCase<'a> {
    fn from(case: &'a TestCase) -> Self {
        Self {
            name: &case.name,
            time: case.duration.as_secs_f64(),
            failure: case
                .failure
                .as_deref()
                .map(|output| JunitFailure { output }),
            skipped: case
                .skipped
                .as_deref()
                .map(|message| JunitSkip { message }),
        }
    }
}

impl TestSuites {
    /// Render as a JUnit XML document.
    pub fn to_junit_xml(&self) -> Result<String> {
        let doc = JunitSuites {
            suites: self.suites.iter().map(JunitSuite::from).collect(),
        };
        quick_xml::se::to_string(&doc).map_err(|e| StepGraphError::ReportRender {
            format: "junit",
            message: e.to_string(),
        })
    }
}

/// Write `suites` to `<dir>/junit_<name>.xml`, creating `dir` if needed.
///
/// Characters outside `[A-Za-z0-9_-]` in `name` become `_`; an empty name
/// becomes `steps`. Returns the path written.
pub fn write_junit(suites: &TestSuites, dir: &Path, name: &str) -> Result<PathBuf> {
    let xml = suites.to_junit_xml()?;
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("junit_{}.xml", file_stem(name)));
    fs::write(&path, xml)?;
    Ok(path)
}

fn file_stem(name: &str) -> String {
    if name.is_empty() {
        return "steps".to_string();
    }
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
