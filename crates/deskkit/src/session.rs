//! Target user and session bus discovery.
//!
//! Provisioning runs as root, but desktop settings belong to the user who
//! invoked it. This module finds that user and the address of their
//! running session bus so settings commands can be run on their behalf.

use crate::error::{Error, Result};
use crate::procfs;
use regex::Regex;
use sequencer::{CommandRunner, CommandSpec, RunAs};
use std::ffi::{CStr, CString};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static DBUS_LAUNCH_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"DBUS_SESSION_BUS_ADDRESS='?([^';\n]+)'?").expect("Invalid dbus-launch regex")
});

/// The desktop user settings are applied for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUser {
    pub name: String,
    pub uid: u32,
    pub home: PathBuf,
}

/// Where user accounts are looked up.
pub trait UserDatabase {
    fn by_name(&self, name: &str) -> Result<Option<TargetUser>>;
    fn by_uid(&self, uid: u32) -> Result<Option<TargetUser>>;
}

/// The system user database through NSS (`getpwnam_r` / `getpwuid_r`), so
/// LDAP, SSSD and systemd-homed accounts resolve like local ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUsers;

#[allow(unsafe_code)]
impl UserDatabase for SystemUsers {
    fn by_name(&self, name: &str) -> Result<Option<TargetUser>> {
        let Ok(c_name) = CString::new(name) else {
            return Ok(None);
        };
        getpw(|pwd, buf, result| {
            // SAFETY: every pointer is valid for the duration of the call and
            // `buf.len()` is the real buffer size
            unsafe {
                libc::getpwnam_r(c_name.as_ptr(), pwd, buf.as_mut_ptr(), buf.len(), result)
            }
        })
    }

    fn by_uid(&self, uid: u32) -> Result<Option<TargetUser>> {
        getpw(|pwd, buf, result| {
            // SAFETY: as above
            unsafe { libc::getpwuid_r(uid, pwd, buf.as_mut_ptr(), buf.len(), result) }
        })
    }
}

const PW_BUFFER_START: usize = 1024;
const PW_BUFFER_MAX: usize = 1 << 20;

/// Run a reentrant passwd lookup, growing the string buffer on `ERANGE`.
#[allow(unsafe_code)]
fn getpw(
    lookup: impl Fn(&mut libc::passwd, &mut [libc::c_char], &mut *mut libc::passwd) -> libc::c_int,
) -> Result<Option<TargetUser>> {
    let mut buf: Vec<libc::c_char> = vec![0; PW_BUFFER_START];
    loop {
        // SAFETY: `passwd` is plain data; the call fills it in
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = lookup(&mut pwd, buf.as_mut_slice(), &mut result);

        if rc == libc::ERANGE && buf.len() < PW_BUFFER_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        // Not found is 0 with a null result; some NSS modules report an errno
        if result.is_null()
            && matches!(rc, 0 | libc::ENOENT | libc::ESRCH | libc::EBADF | libc::EPERM)
        {
            return Ok(None);
        }
        if rc != 0 || result.is_null() {
            return Err(Error::UserLookup(std::io::Error::from_raw_os_error(rc)));
        }

        // SAFETY: on success the strings point into `buf`, which is still alive
        let (name, home) = unsafe {
            (
                CStr::from_ptr(pwd.pw_name).to_string_lossy().into_owned(),
                CStr::from_ptr(pwd.pw_dir).to_string_lossy().into_owned(),
            )
        };
        return Ok(Some(TargetUser {
            name,
            uid: pwd.pw_uid,
            home: PathBuf::from(home),
        }));
    }
}

/// A passwd-format file, for hosts described by fixtures.
#[derive(Debug, Clone, Default)]
pub struct PasswdFile {
    entries: Vec<TargetUser>,
}

impl PasswdFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Passwd {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
            .filter_map(|line| {
                let fields: Vec<&str> = line.split(':').collect();
                if fields.len() < 7 {
                    return None;
                }
                Some(TargetUser {
                    name: fields[0].to_string(),
                    uid: fields[2].parse().ok()?,
                    home: PathBuf::from(fields[5]),
                })
            })
            .collect();
        Self { entries }
    }
}

impl UserDatabase for PasswdFile {
    fn by_name(&self, name: &str) -> Result<Option<TargetUser>> {
        Ok(self.entries.iter().find(|e| e.name == name).cloned())
    }

    fn by_uid(&self, uid: u32) -> Result<Option<TargetUser>> {
        Ok(self.entries.iter().find(|e| e.uid == uid).cloned())
    }
}

impl TargetUser {
    /// Resolve the desktop user.
    ///
    /// As root: `SUDO_USER` (sudo), then `PKEXEC_UID` (pkexec). Otherwise,
    /// or when neither is set, the current user (`euid`).
    pub fn resolve(
        env: &dyn Fn(&str) -> Option<String>,
        euid: u32,
        users: &dyn UserDatabase,
    ) -> Result<Self> {
        let by_uid = |uid: u32| users.by_uid(uid)?.ok_or(Error::UnknownUid(uid));

        if euid == 0 {
            if let Some(name) = env("SUDO_USER").filter(|n| !n.is_empty() && n != "root") {
                return users.by_name(&name)?.ok_or(Error::UnknownUser(name));
            }
            if let Some(value) = env("PKEXEC_UID") {
                let uid = value.trim().parse().map_err(|_| Error::InvalidUid {
                    variable: "PKEXEC_UID".to_string(),
                    value: value.clone(),
                })?;
                return by_uid(uid);
            }
        }
        by_uid(euid)
    }

    /// Run-as target carrying the user's home and session bus.
    pub fn run_as(&self, bus: Option<&SessionBus>) -> RunAs {
        let mut env = vec![
            ("HOME".to_string(), self.home.display().to_string()),
            ("USER".to_string(), self.name.clone()),
        ];
        if let Some(bus) = bus {
            env.extend(bus.env());
        }
        RunAs {
            user: self.name.clone(),
            uid: self.uid,
            env,
        }
    }
}

/// Where a bus address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSource {
    /// This process's own environment
    Environment,
    /// The systemd user runtime socket
    RuntimeDir,
    /// The environment of one of the user's processes
    Process(u32),
    /// A new session started with dbus-launch
    DbusLaunch,
}

/// A reachable session bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBus {
    pub address: String,
    pub runtime_dir: Option<PathBuf>,
    pub source: BusSource,
}

impl SessionBus {
    /// Environment to hand to settings commands.
    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = vec![(
            "DBUS_SESSION_BUS_ADDRESS".to_string(),
            self.address.clone(),
        )];
        if let Some(dir) = &self.runtime_dir {
            env.push(("XDG_RUNTIME_DIR".to_string(), dir.display().to_string()));
        }
        env
    }
}

/// Ordered session bus lookup.
pub struct BusDiscovery<'a> {
    pub env: &'a dyn Fn(&str) -> Option<String>,
    pub euid: u32,
    /// Usually `/run/user`
    pub runtime_root: PathBuf,
    /// Usually `/proc`
    pub proc_root: PathBuf,
    /// Allow starting a synthetic session as the last resort
    pub allow_dbus_launch: bool,
    pub runner: &'a dyn CommandRunner,
}

impl BusDiscovery<'_> {
    /// Find the user's session bus, trying each source in order.
    pub fn discover(&self, user: &TargetUser) -> Option<SessionBus> {
        let runtime_dir = self.runtime_root.join(user.uid.to_string());
        let runtime = runtime_dir.is_dir().then(|| runtime_dir.clone());

        if self.euid == user.uid
            && let Some(address) = (self.env)("DBUS_SESSION_BUS_ADDRESS").filter(|a| !a.is_empty())
        {
            return Some(SessionBus {
                address,
                runtime_dir: runtime,
                source: BusSource::Environment,
            });
        }

        let socket = runtime_dir.join("bus");
        if std::fs::metadata(&socket).is_ok_and(|m| m.file_type().is_socket()) {
            return Some(SessionBus {
                address: format!("unix:path={}", socket.display()),
                runtime_dir: runtime,
                source: BusSource::RuntimeDir,
            });
        }

        for process in procfs::processes(&self.proc_root) {
            if process.uid != user.uid {
                continue;
            }
            if let Some(address) = procfs::environ(&self.proc_root, process.pid)
                .and_then(|mut env| env.remove("DBUS_SESSION_BUS_ADDRESS"))
                .filter(|a| !a.is_empty())
            {
                log::debug!("session bus from {} ({})", process.comm, process.pid);
                return Some(SessionBus {
                    address,
                    runtime_dir: runtime,
                    source: BusSource::Process(process.pid),
                });
            }
        }

        if self.allow_dbus_launch {
            return self.dbus_launch(user, runtime);
        }

        None
    }

    fn dbus_launch(&self, user: &TargetUser, runtime_dir: Option<PathBuf>) -> Option<SessionBus> {
        let spec = CommandSpec::new("dbus-launch")
            .arg("--sh-syntax")
            .run_as(user.run_as(None));
        let output = match self.runner.run(&spec) {
            Ok(output) if output.success => output,
            Ok(output) => {
                log::warn!("dbus-launch failed: {}", output.stderr_str().trim());
                return None;
            }
            Err(e) => {
                log::warn!("dbus-launch failed: {e:#}");
                return None;
            }
        };
        let stdout = output.stdout_str();
        let address = DBUS_LAUNCH_ADDRESS.captures(&stdout)?.get(1)?.as_str().to_string();
        Some(SessionBus {
            address,
            runtime_dir,
            source: BusSource::DbusLaunch,
        })
    }
}
