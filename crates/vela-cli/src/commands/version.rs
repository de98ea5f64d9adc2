//! Version command

use clap::Args;

/// Git revision recorded at build time
const GIT_REVISION: &str = match option_env!("VELA_GIT_REVISION") {
    Some(revision) => revision,
    None => "unknown",
};

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Print only the version
    #[arg(long)]
    pub short: bool,
}

fn version_text(short: bool) -> String {
    let version = env!("CARGO_PKG_VERSION");
    if short {
        return format!("v{}\n", version);
    }
    format!(
        "CLI Version: v{}\nGit Revision: {}\nTarget: {}-{}\n",
        version,
        GIT_REVISION,
        std::env::consts::ARCH,
        std::env::consts::OS
    )
}

/// Run the version command
pub fn run(args: &VersionArgs) {
    print!("{}", version_text(args.short));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_text() {
        assert_eq!(version_text(true), format!("v{}\n", env!("CARGO_PKG_VERSION")));
        let full = version_text(false);
        assert!(full.starts_with("CLI Version: v"));
        assert!(full.contains("Git Revision: "));
        assert!(full.contains(std::env::consts::OS));
    }
}
