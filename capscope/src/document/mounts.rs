//! Mount namespaces reconstructed from embedded `/proc` files.
//!
//! A path recorded in a Map record is the path *inside* the profiled
//! process's mount namespace. To open the binary from the analysis side the
//! path is translated through the process's mounts, the host's block devices
//! and any overlay layers recorded by container runtimes.

/// A block device mounted on the host, from `/proc/mounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDevice {
    pub fs_spec: String,
    pub mount_point: String,
    /// btrfs `subvol=` option, if any.
    pub subvolume: Option<String>,
}

impl MountDevice {
    /// Parse one `/proc/mounts` line: `device mountpoint fstype options dump pass`.
    #[must_use]
    pub fn parse_mounts_line(line: &str) -> Option<Self> {
        let parts: Vec<String> = line.splitn(5, ' ').map(decode_space).collect();
        if parts.len() != 5 {
            return None;
        }
        let subvolume = if parts[2] == "btrfs" {
            parts[3].split(',').find_map(|opt| opt.strip_prefix("subvol=")).map(str::to_string)
        } else {
            None
        };
        Some(Self { fs_spec: parts[0].clone(), mount_point: parts[1].clone(), subvolume })
    }
}

/// `/proc/mounts` escapes spaces as `\040`.
fn decode_space(field: &str) -> String {
    field.replace("\\040", " ")
}

/// A mount inside a process's namespace, from `mountinfo` or an overlay record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mount {
    pub mount_id: i64,
    pub parent_mount_id: i64,
    pub device_major: i32,
    pub device_minor: i32,
    /// Root of the mount within its filesystem.
    pub root: String,
    pub mount_point: String,
    pub mount_source: Option<String>,
    pub filesystem_type: Option<String>,
    pub superblock_options: Option<String>,
    pub is_overlay: bool,
    pub layer: u32,
}

impl Mount {
    /// Parse one `/proc/<pid>/mountinfo` line.
    ///
    /// Layout: `id parent major:minor root mountpoint options [optional...] - fstype source superopts`.
    #[must_use]
    pub fn parse_mountinfo_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.splitn(20, ' ').collect();
        if parts.len() < 10 {
            return None;
        }

        let (major, minor) = parts[2].split_once(':').unwrap_or((parts[2], "0"));
        let mut mount = Self {
            mount_id: parts[0].parse().unwrap_or_default(),
            parent_mount_id: parts[1].parse().unwrap_or_default(),
            device_major: major.parse().unwrap_or_default(),
            device_minor: minor.parse().unwrap_or_default(),
            root: parts[3].to_string(),
            mount_point: parts[4].to_string(),
            ..Self::default()
        };

        // Optional fields run until a lone "-".
        let mut rest = parts[5..].iter().skip_while(|p| **p != "-").skip(1);
        mount.filesystem_type = rest.next().map(|s| (*s).to_string());
        mount.mount_source = rest.next().map(|s| (*s).to_string());
        mount.superblock_options = rest.next().map(|s| (*s).to_string());
        Some(mount)
    }

    /// A container overlay layer mapping `destination` to `host_path`.
    #[must_use]
    pub fn overlay(destination: &str, host_path: &str, layer: u32) -> Self {
        Self {
            root: "/".to_string(),
            mount_point: destination.to_string(),
            mount_source: Some(host_path.to_string()),
            is_overlay: true,
            layer,
            ..Self::default()
        }
    }

    /// Value of a superblock option: `Some("")` for a bare flag, `Some(v)`
    /// for `name=v`, `None` when absent.
    #[must_use]
    pub fn superblock_option(&self, name: &str) -> Option<&str> {
        let opts = self.superblock_options.as_deref()?;
        opts.split(',').find_map(|opt| match opt.strip_prefix(name) {
            Some("") => Some(""),
            Some(value) => value.strip_prefix('='),
            None => None,
        })
    }

    /// `path` with this mount's mount point stripped, if `path` lies beneath it.
    fn relative_path<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.mount_point == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.mount_point.as_str())?;
        rest.starts_with('/').then_some(rest)
    }
}

/// Join path components, collapsing the separators between them.
fn build_filename(parts: &[&str]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if out.is_empty() {
            out.push_str(if i == 0 { part } else { part.trim_start_matches('/') });
            if i != 0 {
                out.insert(0, '/');
            }
        } else {
            if !out.ends_with('/') {
                out.push('/');
            }
            out.push_str(part.trim_start_matches('/'));
        }
    }
    out
}

/// All the devices and mounts visible to one process.
#[derive(Debug, Clone, Default)]
pub struct MountNamespace {
    devices: Vec<MountDevice>,
    mounts: Vec<Mount>,
    sorted: bool,
}

impl MountNamespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, device: MountDevice) {
        self.devices.push(device);
    }

    pub fn add_mount(&mut self, mount: Mount) {
        self.mounts.push(mount);
        self.sorted = false;
    }

    #[must_use]
    pub fn devices(&self) -> &[MountDevice] {
        &self.devices
    }

    #[must_use]
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Order mounts so overlays come first, then deeper mount points, then
    /// lower layers. Must be called before [`translate`](Self::translate).
    pub fn seal(&mut self) {
        if !self.sorted {
            self.mounts.sort_by(|a, b| {
                b.is_overlay
                    .cmp(&a.is_overlay)
                    .then_with(|| b.mount_point.len().cmp(&a.mount_point.len()))
                    .then_with(|| a.layer.cmp(&b.layer))
            });
            self.sorted = true;
        }
    }

    fn find_device(&self, mount: &Mount) -> Option<&MountDevice> {
        let source = mount.mount_source.as_deref();
        let subvolume = mount.superblock_option("subvol");
        self.devices.iter().find(|device| {
            if Some(device.fs_spec.as_str()) != source {
                return false;
            }
            match subvolume {
                // /sysroot is a bind of the real root on image-based systems.
                Some(sv) => device.subvolume.as_deref() == Some(sv) && device.mount_point != "/sysroot",
                None => true,
            }
        })
    }

    /// Candidate host paths for `file`, most specific first. Falls back to
    /// the path itself when no mount matches.
    #[must_use]
    pub fn translate(&self, file: &str) -> Vec<String> {
        let mut out = Vec::new();

        for mount in &self.mounts {
            let Some(relative) = mount.relative_path(file) else { continue };

            if mount.is_overlay {
                if let Some(source) = &mount.mount_source {
                    out.push(build_filename(&[source, relative]));
                }
            } else if mount.filesystem_type.as_deref() == Some("overlay") {
                for key in ["upperdir", "lowerdir"] {
                    if let Some(dirs) = mount.superblock_option(key) {
                        out.extend(dirs.split(':').map(|dir| build_filename(&[dir, relative])));
                    }
                }
            } else if let Some(device) = self.find_device(mount) {
                let mut root = mount.root.as_str();
                if let Some(subvolume) = device.subvolume.as_deref() {
                    if root == subvolume {
                        root = "/";
                    } else if let Some(stripped) =
                        root.strip_prefix(subvolume).filter(|r| r.starts_with('/'))
                    {
                        root = stripped;
                    }
                }
                out.push(build_filename(&[&device.mount_point, root, relative]));
            }
        }

        if out.is_empty() {
            out.push(file.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mounts_line() {
        let dev = MountDevice::parse_mounts_line("/dev/nvme0n1p3 /home btrfs rw,subvol=/home,ssd 0 0").unwrap();
        assert_eq!(dev.fs_spec, "/dev/nvme0n1p3");
        assert_eq!(dev.mount_point, "/home");
        assert_eq!(dev.subvolume.as_deref(), Some("/home"));

        let spaced = MountDevice::parse_mounts_line("/dev/sda1 /media/My\\040Disk ext4 rw 0 0").unwrap();
        assert_eq!(spaced.mount_point, "/media/My Disk");
        assert_eq!(spaced.subvolume, None);

        assert!(MountDevice::parse_mounts_line("short line").is_none());
    }

    #[test]
    fn test_parse_mountinfo_line() {
        let line = "36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue";
        let m = Mount::parse_mountinfo_line(line).unwrap();
        assert_eq!(m.mount_id, 36);
        assert_eq!(m.parent_mount_id, 35);
        assert_eq!((m.device_major, m.device_minor), (98, 0));
        assert_eq!(m.root, "/mnt1");
        assert_eq!(m.mount_point, "/mnt2");
        assert_eq!(m.filesystem_type.as_deref(), Some("ext3"));
        assert_eq!(m.mount_source.as_deref(), Some("/dev/root"));
        assert_eq!(m.superblock_option("errors"), Some("continue"));
        assert_eq!(m.superblock_option("rw"), Some(""));
        assert_eq!(m.superblock_option("ro"), None);

        assert!(Mount::parse_mountinfo_line("1 2 3:4 / /").is_none());
    }

    #[test]
    fn test_translate_through_device() {
        let mut ns = MountNamespace::new();
        ns.add_device(MountDevice::parse_mounts_line("/dev/sda2 /var/host ext4 rw 0 0").unwrap());
        ns.add_mount(Mount::parse_mountinfo_line("1 0 8:2 / / rw - ext4 /dev/sda2 rw").unwrap());
        ns.seal();
        assert_eq!(ns.translate("/usr/bin/bash"), vec!["/var/host/usr/bin/bash".to_string()]);
    }

    #[test]
    fn test_translate_btrfs_subvolume() {
        let mut ns = MountNamespace::new();
        ns.add_device(MountDevice::parse_mounts_line("/dev/sda3 / btrfs rw,subvol=/root 0 0").unwrap());
        ns.add_mount(Mount::parse_mountinfo_line("1 0 0:30 /root / rw - btrfs /dev/sda3 rw,subvol=/root").unwrap());
        ns.seal();
        assert_eq!(ns.translate("/usr/lib/libc.so.6"), vec!["/usr/lib/libc.so.6".to_string()]);
    }

    #[test]
    fn test_overlay_first_and_fallback() {
        let mut ns = MountNamespace::new();
        ns.add_mount(Mount::overlay("/app", "/var/lib/flatpak/app/files", 0));
        ns.add_mount(Mount::parse_mountinfo_line(
            "5 1 0:50 / /usr rw - overlay overlay rw,lowerdir=/l1:/l2,upperdir=/up",
        )
        .unwrap());
        ns.seal();
        assert_eq!(ns.mounts()[0].mount_point, "/app");
        assert_eq!(ns.translate("/app/bin/tool"), vec!["/var/lib/flatpak/app/files/bin/tool".to_string()]);
        assert_eq!(
            ns.translate("/usr/lib/x.so"),
            vec!["/up/lib/x.so".to_string(), "/l1/lib/x.so".to_string(), "/l2/lib/x.so".to_string()]
        );
        assert_eq!(ns.translate("/opt/other"), vec!["/opt/other".to_string()]);
        // The mount point itself is a directory, never a file.
        assert_eq!(ns.translate("/app"), vec!["/app".to_string()]);
    }

    #[test]
    fn test_build_filename() {
        assert_eq!(build_filename(&["/host/", "/", "/usr/bin"]), "/host/usr/bin");
        assert_eq!(build_filename(&["/", "/usr"]), "/usr");
    }
}
