//! System information dump for bug reports.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SystemInfo {
    pub machine: String,
    pub processor: String,
    pub num_processors: usize,
    pub os_version: String,
    pub ram_mb: u64,
    pub swap_mb: u64,
}

impl SystemInfo {
    /// Query the running system. Fields that can't be read get placeholder
    /// values instead of failing the whole dump.
    pub fn gather() -> Self {
        let (os_version, machine) = uname_fields();
        let processor = std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|text| parse_cpu_model(&text))
            .unwrap_or_else(|| "unknown".to_string());
        let num_processors = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let (ram_mb, swap_mb) = memory_mb();

        Self {
            machine,
            processor,
            num_processors,
            os_version,
            ram_mb,
            swap_mb,
        }
    }

    /// Lines written to the log by [`SystemInfo::log`].
    pub fn lines(&self) -> [String; 4] {
        [
            self.machine.clone(),
            format!("Processor: {} ({})", self.processor, self.num_processors),
            self.os_version.clone(),
            format!("Memory: {} MB total, {} MB swap", self.ram_mb, self.swap_mb),
        ]
    }

    pub fn log(&self) {
        for line in self.lines() {
            log::info!("{}", line);
        }
    }
}

impl fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// Model name of the first processor listed in /proc/cpuinfo.
pub fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| matches!(key.trim(), "model name" | "Model" | "cpu"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|model| !model.is_empty())
}

#[cfg(unix)]
fn uname_fields() -> (String, String) {
    match nix::sys::utsname::uname() {
        Ok(uts) => (
            format!(
                "{} {}",
                uts.sysname().to_string_lossy(),
                uts.release().to_string_lossy()
            ),
            uts.machine().to_string_lossy().into_owned(),
        ),
        Err(e) => {
            log::debug!("uname failed: {}", e);
            ("Unknown system version".to_string(), "unknown machine".to_string())
        }
    }
}

#[cfg(not(unix))]
fn uname_fields() -> (String, String) {
    ("Unknown system version".to_string(), "unknown machine".to_string())
}

/// Physical RAM and swap in MB, zero when unknown.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn memory_mb() -> (u64, u64) {
    const MB: u64 = 1024 * 1024;

    let mut info: libc::sysinfo = unsafe { std::mem::zeroed() };
    if unsafe { libc::sysinfo(&mut info) } != 0 {
        log::debug!("sysinfo failed: {}", std::io::Error::last_os_error());
        return (0, 0);
    }

    let unit = u64::from(info.mem_unit.max(1));
    (
        info.totalram as u64 * unit / MB,
        info.totalswap as u64 * unit / MB,
    )
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn memory_mb() -> (u64, u64) {
    (0, 0)
}
