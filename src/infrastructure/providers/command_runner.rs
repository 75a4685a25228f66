//! Provider CLI 실행기.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::infrastructure::config::ProviderCommandSpec;

/// provider 명령을 실행하고, stdin 비터미널 오류 시 인자 전달로 자동 재시도한다.
pub async fn run_model_command(
    provider_name: &str,
    spec: &ProviderCommandSpec,
    extra_args: &[String],
    prompt: &str,
) -> Result<String> {
    let mut current = spec.clone();
    let mut tried_stdin_fallback = false;

    loop {
        match run_model_command_once(provider_name, &current, extra_args, prompt).await {
            Ok(text) => return Ok(text),
            Err(err) => {
                let lower = format!("{err:#}").to_lowercase();

                // Some CLIs reject piped stdin and require argument-based input.
                if current.use_stdin
                    && !tried_stdin_fallback
                    && lower.contains("stdin is not a terminal")
                {
                    tried_stdin_fallback = true;
                    current.use_stdin = false;
                    continue;
                }

                return Err(err);
            }
        }
    }
}

async fn run_model_command_once(
    provider_name: &str,
    spec: &ProviderCommandSpec,
    extra_args: &[String],
    prompt: &str,
) -> Result<String> {
    // {prompt} 치환 또는 stdin 전달 규칙에 따라 최종 실행 인자를 구성한다.
    let mut args = Vec::new();
    let mut prompt_in_args = false;
    for arg in spec.args.iter().chain(extra_args) {
        if arg.contains("{prompt}") {
            prompt_in_args = true;
            args.push(arg.replace("{prompt}", prompt));
        } else {
            args.push(arg.clone());
        }
    }

    if !spec.use_stdin && !prompt_in_args {
        args.push(prompt.to_string());
    }

    let mut cmd = Command::new(&spec.command);
    cmd.args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if spec.use_stdin {
        cmd.stdin(Stdio::piped());
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {} command '{}'", provider_name, spec.command))?;

    if spec.use_stdin {
        let mut stdin = child
            .stdin
            .take()
            .context("failed to open provider command stdin")?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .context("failed to write prompt to provider command stdin")?;
        drop(stdin);
    }

    let output = child
        .wait_with_output()
        .await
        .context("provider command execution failed")?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        bail!(
            "{} command failed ({}): {}",
            provider_name,
            output.status,
            if stderr.is_empty() {
                "no stderr output"
            } else {
                stderr.as_str()
            }
        );
    }

    if stdout.is_empty() {
        if stderr.is_empty() {
            bail!("{} command returned empty output", provider_name);
        }
        return Ok(stderr);
    }

    Ok(stdout)
}
