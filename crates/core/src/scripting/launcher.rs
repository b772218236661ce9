//! Argument building and launch plans.
//!
//! A [`LaunchPlan`] is the fully resolved program + argv + environment for
//! one run. Plans are built either for a local Python interpreter or for a
//! throwaway `docker run` container that mounts the scripts directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::manifest::{ParameterKind, ScriptDescriptor};
use crate::error::CoreError;

/// Mount point of the scripts directory inside the runner container.
pub const CONTAINER_SCRIPTS_DIR: &str = "/app/python_pipeline";

/// Replacement shown instead of secret values.
pub const MASK: &str = "********";

/// Where scripts are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Host Python interpreter.
    #[default]
    Local,
    /// `docker run` with the runner image.
    Docker,
}

impl FromStr for RunMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "docker" => Ok(Self::Docker),
            other => Err(CoreError::Validation(format!(
                "unknown run mode '{other}' (expected 'local' or 'docker')"
            ))),
        }
    }
}

/// Resolved command for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub env_vars: Vec<(String, String)>,
    /// Arguments for `program` that tear down whatever outlives the spawned
    /// process once it has been killed (the container behind `docker run`).
    pub stop_args: Option<Vec<String>>,
}

impl LaunchPlan {
    /// `python -u <script> <args>` run from the script's own directory.
    pub fn python(python_bin: &str, script_path: &Path, script_args: Vec<String>) -> Self {
        let mut args = vec!["-u".to_string(), script_path.display().to_string()];
        args.extend(script_args);
        Self {
            program: python_bin.to_string(),
            args,
            working_directory: script_path.parent().map(Path::to_path_buf),
            env_vars: vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())],
            stop_args: None,
        }
    }

    /// `docker run` with `scripts_dir` mounted at [`CONTAINER_SCRIPTS_DIR`].
    ///
    /// The container is named `container_name` so it can be killed with
    /// `docker kill` when the run is cancelled or times out. Killing the
    /// `docker` CLI alone leaves the container running.
    ///
    /// `relative_script` must already be validated as relative.
    pub fn docker(
        image: &str,
        scripts_dir: &Path,
        relative_script: &Path,
        script_args: Vec<String>,
        container_name: &str,
    ) -> Self {
        let parts: Vec<String> = relative_script
            .iter()
            .map(|c| c.to_string_lossy().into_owned())
            .filter(|c| c != ".")
            .collect();
        let (file_name, dirs) = parts
            .split_last()
            .map(|(f, d)| (f.clone(), d.to_vec()))
            .unwrap_or_default();
        let workdir = if dirs.is_empty() {
            CONTAINER_SCRIPTS_DIR.to_string()
        } else {
            format!("{CONTAINER_SCRIPTS_DIR}/{}", dirs.join("/"))
        };

        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            container_name.to_string(),
            "--network".to_string(),
            "host".to_string(),
            "-v".to_string(),
            format!("{}:{CONTAINER_SCRIPTS_DIR}", scripts_dir.display()),
            "-w".to_string(),
            workdir,
            "-e".to_string(),
            "PYTHONUNBUFFERED=1".to_string(),
            image.to_string(),
            "python".to_string(),
            "-u".to_string(),
            file_name,
        ];
        args.extend(script_args);

        Self {
            program: "docker".to_string(),
            args,
            working_directory: None,
            env_vars: Vec::new(),
            stop_args: Some(vec!["kill".to_string(), container_name.to_string()]),
        }
    }

    /// Build a [`tokio::process::Command`] for this plan (stdio untouched).
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Command that stops what outlives the killed process, if anything does.
    pub fn stop_command(&self) -> Option<tokio::process::Command> {
        let args = self.stop_args.as_ref()?;
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(args);
        Some(cmd)
    }

    /// Printable command line with secret flag values masked.
    pub fn display(&self) -> String {
        let mut out = vec![self.program.clone()];
        let mut mask_next = false;
        for arg in &self.args {
            // A bare secret-looking flag is followed by the next flag, not a value.
            if mask_next && !arg.starts_with("--") {
                out.push(MASK.to_string());
                mask_next = false;
                continue;
            }
            if let Some(flag) = arg.strip_prefix("--") {
                mask_next = is_secret_key(flag);
            }
            out.push(arg.clone());
        }
        out.join(" ")
    }
}

/// Whether a parameter name holds a credential.
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ["password", "secret", "token"]
        .iter()
        .any(|needle| key.contains(needle))
}

/// Turn request parameters into CLI flags, sorted by key.
///
/// `true` becomes a bare flag, `false` and `null` are omitted, arrays are
/// comma-joined and objects are passed as compact JSON.
pub fn build_arguments(params: &Map<String, Value>) -> Vec<String> {
    let sorted: BTreeMap<&String, &Value> = params.iter().collect();
    let mut args = Vec::with_capacity(sorted.len() * 2);

    for (key, value) in sorted {
        let flag = format!("--{key}");
        match value {
            Value::Null | Value::Bool(false) => {}
            Value::Bool(true) => args.push(flag),
            Value::String(s) => {
                if !s.is_empty() {
                    args.push(flag);
                    args.push(s.clone());
                }
            }
            Value::Number(n) => {
                args.push(flag);
                args.push(n.to_string());
            }
            Value::Array(items) => {
                if !items.is_empty() {
                    let joined: Vec<String> = items.iter().map(scalar_to_string).collect();
                    args.push(flag);
                    args.push(joined.join(","));
                }
            }
            Value::Object(_) => {
                args.push(flag);
                args.push(value.to_string());
            }
        }
    }

    args
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Copy of `params` with secret values replaced by [`MASK`].
pub fn mask_parameters(params: &Map<String, Value>) -> Map<String, Value> {
    params
        .iter()
        .map(|(k, v)| {
            let v = if is_secret_key(k) && !v.is_null() {
                Value::String(MASK.to_string())
            } else {
                v.clone()
            };
            (k.clone(), v)
        })
        .collect()
}

/// Check request parameters against the script's declared parameters.
///
/// Undeclared parameters are passed through untouched.
pub fn validate_parameters(
    script: &ScriptDescriptor,
    params: &Map<String, Value>,
) -> Result<(), CoreError> {
    for param in &script.parameters {
        let value = params.get(&param.name);
        let missing = match value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(a)) => a.is_empty(),
            Some(_) => false,
        };
        if missing {
            if param.required && param.default.is_none() {
                return Err(CoreError::Validation(format!(
                    "parameter '{}' is required",
                    param.name
                )));
            }
            continue;
        }

        let Some(value) = value else { continue };
        let type_ok = match param.kind {
            ParameterKind::Number => value.is_number(),
            ParameterKind::Boolean => value.is_boolean(),
            ParameterKind::Select => {
                param.options.is_empty()
                    || value
                        .as_str()
                        .is_some_and(|v| param.options.iter().any(|o| o == v))
            }
            ParameterKind::Multiselect => value.is_array() || value.is_string(),
            ParameterKind::Text | ParameterKind::Password => !value.is_object(),
        };
        if !type_ok {
            return Err(CoreError::Validation(format!(
                "parameter '{}' has an invalid value for type {:?}",
                param.name, param.kind
            )));
        }
    }
    Ok(())
}

/// Fill in declared defaults for parameters the request left out.
pub fn apply_defaults(script: &ScriptDescriptor, params: &mut Map<String, Value>) {
    for param in &script.parameters {
        if let Some(default) = &param.default {
            let absent = params.get(&param.name).map_or(true, Value::is_null);
            if absent {
                params.insert(param.name.clone(), default.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::scripting::capabilities::Capabilities;
    use crate::scripting::manifest::ParameterSpec;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn param(name: &str, kind: ParameterKind, required: bool) -> ParameterSpec {
        ParameterSpec {
            name: name.into(),
            label: None,
            kind,
            required,
            default: None,
            options: vec![],
            description: None,
        }
    }

    fn script(parameters: Vec<ParameterSpec>) -> ScriptDescriptor {
        ScriptDescriptor {
            id: "s".into(),
            display_name: "S".into(),
            description: String::new(),
            path: "s/run.py".into(),
            category: None,
            tags: vec![],
            capabilities: Capabilities::default(),
            parameters,
            metadata_file: None,
            timeout_secs: None,
        }
    }

    #[test]
    fn arguments_are_sorted_and_typed() {
        let args = build_arguments(&params(json!({
            "hostname": "172.20.0.11",
            "verbose": true,
            "dry_run": false,
            "retries": 3,
            "tests": ["test_bgp", "test_ospf"],
            "unused": null,
            "empty": "",
        })));
        assert_eq!(
            args,
            vec![
                "--hostname",
                "172.20.0.11",
                "--retries",
                "3",
                "--tests",
                "test_bgp,test_ospf",
                "--verbose",
            ]
        );
    }

    #[test]
    fn object_values_are_compact_json() {
        let args = build_arguments(&params(json!({"vars": {"asn": 65001}})));
        assert_eq!(args, vec!["--vars", r#"{"asn":65001}"#]);
    }

    #[test]
    fn python_plan() {
        let plan = LaunchPlan::python(
            "python3",
            Path::new("/srv/scripts/backup/run.py"),
            vec!["--hostname".into(), "r1".into()],
        );
        assert_eq!(plan.program, "python3");
        assert_eq!(
            plan.args,
            vec!["-u", "/srv/scripts/backup/run.py", "--hostname", "r1"]
        );
        assert_eq!(
            plan.working_directory.as_deref(),
            Some(Path::new("/srv/scripts/backup"))
        );
    }

    #[test]
    fn docker_plan() {
        let plan = LaunchPlan::docker(
            "vlabs-python-runner",
            Path::new("/srv/scripts"),
            Path::new("jsnapy_runner/run_jsnapy_tests.py"),
            vec!["--hostname".into(), "r1".into()],
            "vlabs-run-1",
        );
        assert_eq!(plan.program, "docker");
        assert_eq!(
            plan.args,
            vec![
                "run",
                "--rm",
                "--name",
                "vlabs-run-1",
                "--network",
                "host",
                "-v",
                "/srv/scripts:/app/python_pipeline",
                "-w",
                "/app/python_pipeline/jsnapy_runner",
                "-e",
                "PYTHONUNBUFFERED=1",
                "vlabs-python-runner",
                "python",
                "-u",
                "run_jsnapy_tests.py",
                "--hostname",
                "r1",
            ]
        );
        assert_eq!(
            plan.stop_args,
            Some(vec!["kill".to_string(), "vlabs-run-1".to_string()])
        );
    }

    #[test]
    fn stop_command_only_for_containers() {
        let local = LaunchPlan::python("python3", Path::new("/s/run.py"), vec![]);
        assert!(local.stop_command().is_none());

        let docker = LaunchPlan::docker("img", Path::new("/s"), Path::new("run.py"), vec![], "c1");
        let stop = docker.stop_command().expect("docker plan has a stop command");
        let std_cmd = stop.as_std();
        assert_eq!(std_cmd.get_program(), "docker");
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, ["kill", "c1"]);
    }

    #[test]
    fn docker_plan_for_top_level_script() {
        let plan = LaunchPlan::docker("img", Path::new("/s"), Path::new("run.py"), vec![], "c1");
        let w = plan.args.iter().position(|a| a == "-w").expect("-w");
        assert_eq!(plan.args[w + 1], CONTAINER_SCRIPTS_DIR);
        assert_eq!(plan.args.last().map(String::as_str), Some("run.py"));
    }

    #[test]
    fn display_masks_secrets() {
        let plan = LaunchPlan::python(
            "python3",
            Path::new("/s/run.py"),
            build_arguments(&params(json!({"password": "hunter2", "username": "root"}))),
        );
        let shown = plan.display();
        assert!(!shown.contains("hunter2"), "secret leaked: {shown}");
        assert!(shown.contains("--password ********"));
        assert!(shown.contains("--username root"));
    }

    #[test]
    fn display_keeps_flag_after_bare_secret_flag() {
        let plan = LaunchPlan::python(
            "python3",
            Path::new("/s/run.py"),
            build_arguments(&params(json!({"use_token": true, "verbose": true, "x_token": "abc"}))),
        );
        assert_eq!(
            plan.display(),
            "python3 -u /s/run.py --use_token --verbose --x_token ********"
        );
    }

    #[test]
    fn mask_parameters_hides_secret_values() {
        let masked = mask_parameters(&params(json!({
            "password": "x",
            "api_token": "y",
            "hostname": "r1",
            "secret_key": null,
        })));
        assert_eq!(masked["password"], MASK);
        assert_eq!(masked["api_token"], MASK);
        assert_eq!(masked["hostname"], "r1");
        assert!(masked["secret_key"].is_null());
    }

    #[test]
    fn required_parameter_missing() {
        let s = script(vec![param("hostname", ParameterKind::Text, true)]);
        let result = validate_parameters(&s, &params(json!({"hostname": "  "})));
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("hostname"));
    }

    #[test]
    fn required_parameter_with_default_is_ok() {
        let mut p = param("port", ParameterKind::Number, true);
        p.default = Some(json!(830));
        let s = script(vec![p]);
        let mut request = Map::new();
        assert!(validate_parameters(&s, &request).is_ok());
        apply_defaults(&s, &mut request);
        assert_eq!(request["port"], 830);
    }

    #[test]
    fn type_checks() {
        let s = script(vec![
            param("port", ParameterKind::Number, false),
            param("force", ParameterKind::Boolean, false),
        ]);
        assert!(validate_parameters(&s, &params(json!({"port": 830, "force": true}))).is_ok());
        assert!(validate_parameters(&s, &params(json!({"port": "830"}))).is_err());
        assert!(validate_parameters(&s, &params(json!({"port": "abc"}))).is_err());
        assert!(validate_parameters(&s, &params(json!({"force": "yes"}))).is_err());
    }

    #[test]
    fn select_must_match_options() {
        let mut action = param("action", ParameterKind::Select, true);
        action.options = vec!["backup".into(), "restore".into()];
        let s = script(vec![action]);
        assert!(validate_parameters(&s, &params(json!({"action": "backup"}))).is_ok());
        assert!(validate_parameters(&s, &params(json!({"action": "wipe"}))).is_err());
    }

    #[test]
    fn run_mode_parsing() {
        assert_eq!("Docker".parse::<RunMode>().expect("docker"), RunMode::Docker);
        assert_eq!("local".parse::<RunMode>().expect("local"), RunMode::Local);
        assert!("podman".parse::<RunMode>().is_err());
    }
}
