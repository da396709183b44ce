use super::command::CommandBuilder;
use crate::config::PrivilegeMode;
use crate::prelude::*;
use std::process::Stdio;
use tokio::process::Command;

fn is_root_user() -> bool {
    #[cfg(unix)]
    return nix::unistd::Uid::current().is_root();
    #[cfg(not(unix))]
    return false;
}

/// Privilege held for the privileged stages, as established by [`Privilege::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Already running as root
    Root,
    /// Cached sudo credentials allow non-interactive elevation
    Sudo,
    /// Configured to trust the current context
    Inherited,
}

impl Privilege {
    /// Check whether the privileged stages can run. Never prompts for a password.
    ///
    /// The error holds the reason the stages will be reported unavailable.
    pub async fn probe(mode: PrivilegeMode) -> std::result::Result<Privilege, String> {
        if mode == PrivilegeMode::Inherit {
            return Ok(Privilege::Inherited);
        }
        if is_root_user() {
            return Ok(Privilege::Root);
        }

        // `sudo --non-interactive true` fails if sudo does not exist or a password would be required
        let status = Command::new("sudo")
            .args(["--non-interactive", "true"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(status) if status.success() => Ok(Privilege::Sudo),
            Ok(_) => Err("non-interactive sudo is not permitted for the current user".into()),
            Err(err) => Err(format!("sudo could not be executed: {err}")),
        }
    }

    /// Wrap `cmd` so that it runs with this privilege.
    pub fn wrap(&self, mut cmd: CommandBuilder) -> CommandBuilder {
        if *self == Privilege::Sudo {
            // sudo resets the environment, so it is passed through `env` after elevation
            cmd.inline_envs().wrap("sudo", ["--non-interactive"]);
            trace!("Wrapped with sudo: {}", cmd.as_command_line());
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inherit_skips_the_probe() {
        assert_eq!(
            Privilege::probe(PrivilegeMode::Inherit).await,
            Ok(Privilege::Inherited)
        );
    }

    #[test]
    fn test_sudo_wrap_passes_env_explicitly() {
        let mut cmd = CommandBuilder::new("build/addition");
        cmd.arg("--measure").env("OMP_NUM_THREADS", "8");

        let wrapped = Privilege::Sudo.wrap(cmd);
        let args: Vec<_> = wrapped
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(wrapped.get_program(), "sudo");
        assert_eq!(
            args,
            vec![
                "--non-interactive",
                "env",
                "OMP_NUM_THREADS=8",
                "build/addition",
                "--measure"
            ]
        );
    }

    #[test]
    fn test_other_privileges_do_not_wrap() {
        for privilege in [Privilege::Root, Privilege::Inherited] {
            let mut cmd = CommandBuilder::new("build/addition");
            cmd.env("OMP_NUM_THREADS", "8");
            let wrapped = privilege.wrap(cmd);
            assert_eq!(wrapped.as_command_line(), "build/addition");
            assert_eq!(wrapped.get_envs().count(), 1);
        }
    }
}
