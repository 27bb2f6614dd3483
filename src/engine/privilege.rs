//! Elevated capabilities granted to the engine child.
//!
//! The engine needs to bind low ports, program routing and open raw sockets,
//! but never runs as a fully privileged user. The capabilities it gets are
//! described by a [`PrivilegeDescriptor`] and raised into the child's ambient
//! set between fork and exec.

use std::fmt;

/// Linux capabilities the supervisor knows how to grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    NetBindService,
    NetAdmin,
    NetRaw,
}

impl Capability {
    /// Kernel capability number (see `linux/capability.h`).
    pub fn number(self) -> u32 {
        match self {
            Capability::NetBindService => 10,
            Capability::NetAdmin => 12,
            Capability::NetRaw => 13,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::NetBindService => "CAP_NET_BIND_SERVICE",
            Capability::NetAdmin => "CAP_NET_ADMIN",
            Capability::NetRaw => "CAP_NET_RAW",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The minimal set the engine runs with.
pub const ENGINE_CAPABILITIES: [Capability; 3] = [
    Capability::NetBindService,
    Capability::NetAdmin,
    Capability::NetRaw,
];

/// Capabilities to raise into a child's ambient set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeDescriptor {
    ambient: Vec<Capability>,
}

impl PrivilegeDescriptor {
    /// The descriptor used for the proxy engine.
    pub fn engine() -> Self {
        Self {
            ambient: ENGINE_CAPABILITIES.to_vec(),
        }
    }

    /// Launch without any extra capabilities.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ambient(&self) -> &[Capability] {
        &self.ambient
    }

    pub fn is_empty(&self) -> bool {
        self.ambient.is_empty()
    }

    /// Install a pre-exec hook that raises the ambient capabilities.
    #[cfg(target_os = "linux")]
    pub(crate) fn apply(&self, cmd: &mut tokio::process::Command) -> std::io::Result<()> {
        if self.ambient.is_empty() {
            return Ok(());
        }
        let numbers: Vec<u32> = self.ambient.iter().map(|c| c.number()).collect();
        // SAFETY: the hook only issues raw syscalls on a pre-built slice and
        // does not allocate, which keeps it async-signal-safe after fork.
        unsafe {
            cmd.pre_exec(move || linux::raise_ambient(&numbers));
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub(crate) fn apply(&self, _cmd: &mut tokio::process::Command) -> std::io::Result<()> {
        if self.ambient.is_empty() {
            return Ok(());
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "ambient capabilities are only supported on Linux",
        ))
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::io;

    const LINUX_CAPABILITY_VERSION_3: u32 = 0x2008_0522;

    #[repr(C)]
    struct CapUserHeader {
        version: u32,
        pid: libc::c_int,
    }

    #[repr(C)]
    #[derive(Default, Clone, Copy)]
    struct CapUserData {
        effective: u32,
        permitted: u32,
        inheritable: u32,
    }

    /// Add each capability to the inheritable set, then raise it as ambient.
    ///
    /// A capability can only become ambient when it is both permitted and
    /// inheritable, so the capset must come first.
    pub(super) fn raise_ambient(caps: &[u32]) -> io::Result<()> {
        let mut header = CapUserHeader {
            version: LINUX_CAPABILITY_VERSION_3,
            pid: 0,
        };
        let mut data = [CapUserData::default(); 2];

        // SAFETY: header and data match the v3 capget/capset ABI.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_capget,
                &mut header as *mut CapUserHeader,
                data.as_mut_ptr(),
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        for &cap in caps {
            data[(cap / 32) as usize].inheritable |= 1 << (cap % 32);
        }

        // SAFETY: as above.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_capset,
                &mut header as *mut CapUserHeader,
                data.as_ptr(),
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        for &cap in caps {
            // SAFETY: PR_CAP_AMBIENT takes plain integer arguments.
            let rc = unsafe {
                libc::prctl(
                    libc::PR_CAP_AMBIENT,
                    libc::PR_CAP_AMBIENT_RAISE as libc::c_ulong,
                    cap as libc::c_ulong,
                    0 as libc::c_ulong,
                    0 as libc::c_ulong,
                )
            };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}
