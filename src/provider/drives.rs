use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};

use tracing::debug;

use crate::item::{Attributes, Item, ItemKind};
use crate::provider::{
    Capabilities, DiskProvider, InputStream, ItemIter, OutputStream, Pattern, Provider,
    ProviderError, erase, normalize_separators, unsupported,
};

static GLOBAL: LazyLock<Arc<DriveProvider>> =
    LazyLock::new(|| DriveProvider::with_source(SystemVolumes));

/// One logical volume of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub mount_point: PathBuf,
    pub device: String,
    pub fs_type: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub total: u64,
    pub free: u64,
    pub available: u64,
}

impl Volume {
    pub fn capacity(&self) -> io::Result<Capacity> {
        Ok(Capacity {
            total: fs2::total_space(&self.mount_point)?,
            free: fs2::free_space(&self.mount_point)?,
            available: fs2::available_space(&self.mount_point)?,
        })
    }
}

/// Where the drive list comes from and how volumes get relabeled.
pub trait VolumeSource: Send + Sync + fmt::Debug {
    fn volumes(&self) -> io::Result<Vec<Volume>>;

    /// Returns `Ok(false)` when the volume cannot be relabeled from here.
    fn relabel(&self, volume: &Volume, label: &str) -> io::Result<bool>;
}

/// The volumes of the running machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemVolumes;

#[cfg(unix)]
const MOUNT_TABLE: &str = "/proc/self/mounts";

impl VolumeSource for SystemVolumes {
    #[cfg(unix)]
    fn volumes(&self) -> io::Result<Vec<Volume>> {
        match std::fs::read_to_string(MOUNT_TABLE) {
            Ok(contents) => Ok(parse_mount_table(&contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No mount table at {}, reporting the root volume only", MOUNT_TABLE);
                Ok(vec![Volume {
                    mount_point: PathBuf::from("/"),
                    device: String::new(),
                    fs_type: String::new(),
                    label: "/".to_string(),
                }])
            }
            Err(err) => Err(err),
        }
    }

    #[cfg(windows)]
    fn volumes(&self) -> io::Result<Vec<Volume>> {
        Ok((b'A'..=b'Z')
            .map(|letter| format!("{}:\\", letter as char))
            .filter(|root| Path::new(root).exists())
            .map(|root| Volume {
                label: format!("Local Disk ({})", &root[..2]),
                device: root.clone(),
                fs_type: String::new(),
                mount_point: PathBuf::from(root),
            })
            .collect())
    }

    #[cfg(not(any(unix, windows)))]
    fn volumes(&self) -> io::Result<Vec<Volume>> {
        Ok(Vec::new())
    }

    fn relabel(&self, volume: &Volume, label: &str) -> io::Result<bool> {
        debug!(
            "Relabeling {} to '{}' is not available on this platform",
            volume.mount_point.display(),
            label
        );
        Ok(false)
    }
}

/// Parses a `/proc/mounts`-style table, keeping block-device mounts only.
pub(crate) fn parse_mount_table(contents: &str) -> Vec<Volume> {
    let mut volumes: Vec<Volume> = Vec::new();

    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let (Some(device), Some(mount_point), Some(fs_type)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if !device.starts_with("/dev/") {
            continue;
        }

        let mount_point = PathBuf::from(unescape_mount_field(mount_point));
        if volumes.iter().any(|v| v.mount_point == mount_point) {
            continue;
        }

        let label = mount_point
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| mount_point.display().to_string());

        volumes.push(Volume {
            mount_point,
            device: device.to_string(),
            fs_type: fs_type.to_string(),
            label,
        });
    }

    volumes
}

/// Mount tables escape whitespace and backslashes as three-digit octal codes.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\' && index + 3 < bytes.len() {
            let digits = &bytes[index + 1..index + 4];
            let code = std::str::from_utf8(digits)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(code) = code {
                decoded.push(code);
                index += 4;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

/// A read-only root whose children are the machine's logical volumes.
///
/// Below a volume, everything is resolved by the disk provider, so items from
/// inside a volume carry the disk provider's capabilities.
#[derive(Debug)]
pub struct DriveProvider {
    this: Weak<DriveProvider>,
    source: Box<dyn VolumeSource>,
    disk: Arc<DiskProvider>,
}

impl DriveProvider {
    pub fn global() -> Arc<DriveProvider> {
        Arc::clone(&GLOBAL)
    }

    pub fn with_source(source: impl VolumeSource + 'static) -> Arc<Self> {
        Arc::new_cyclic(|this| DriveProvider {
            this: this.clone(),
            source: Box::new(source),
            disk: DiskProvider::global(),
        })
    }

    pub fn handle(&self) -> Weak<dyn Provider> {
        erase(&self.this)
    }

    pub fn volumes(&self) -> Result<Vec<Volume>, ProviderError> {
        self.source
            .volumes()
            .map_err(|err| ProviderError::from_io(Path::new(""), err))
    }

    fn is_root(path: &Path) -> bool {
        path.as_os_str().is_empty()
    }

    fn find_volume(&self, path: &Path) -> Result<Option<Volume>, ProviderError> {
        Ok(self
            .volumes()?
            .into_iter()
            .find(|volume| volume.mount_point == path))
    }

    fn root_item(&self) -> Item {
        Item::new("Computer", PathBuf::new(), self.handle())
            .with_attributes(Attributes::DIRECTORY | Attributes::READ_ONLY)
            .with_type_label("System Folder")
    }

    fn volume_item(&self, volume: &Volume) -> Item {
        let type_label = if volume.fs_type.is_empty() {
            "Local Disk".to_string()
        } else {
            format!("Local Disk ({})", volume.fs_type)
        };
        Item::new(volume.label.clone(), volume.mount_point.clone(), self.handle())
            .with_attributes(Attributes::DIRECTORY | Attributes::VOLUME)
            .with_type_label(type_label)
    }
}

impl Provider for DriveProvider {
    fn name(&self) -> &str {
        "drives"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_rename: true,
            ..Capabilities::READ_ONLY
        }
    }

    fn is_root_provider(&self) -> bool {
        true
    }

    fn exists(&self, path: &Path) -> bool {
        Self::is_root(path)
            || matches!(self.find_volume(path), Ok(Some(_)))
            || self.disk.exists(path)
    }

    fn get_item(&self, path: &Path) -> Result<Option<Item>, ProviderError> {
        if Self::is_root(path) {
            return Ok(Some(self.root_item()));
        }
        if let Some(volume) = self.find_volume(path)? {
            return Ok(Some(self.volume_item(&volume)));
        }
        self.disk.get_item(path)
    }

    fn get_child_items<'a>(
        &'a self,
        path: &Path,
        pattern: &Pattern,
    ) -> Result<ItemIter<'a>, ProviderError> {
        if !Self::is_root(path) {
            return self.disk.get_child_items(path, pattern);
        }

        debug!("Enumerating volumes (pattern '{}')", pattern);
        let items: Vec<Item> = self
            .volumes()?
            .iter()
            .filter(|volume| pattern.matches(&volume.label))
            .map(|volume| self.volume_item(volume))
            .collect();
        Ok(Box::new(items.into_iter().map(Ok)))
    }

    fn create_path(&self, _path: &Path, _kind: ItemKind) -> Result<bool, ProviderError> {
        // The drive list is never extended from here.
        Ok(self.capabilities().allows_creation())
    }

    fn remove_item(&self, _path: &Path, _force: bool) -> Result<bool, ProviderError> {
        Ok(self.capabilities().allows_removal())
    }

    fn rename_item(
        &self,
        item: &mut Item,
        new_name: &str,
        _force: bool,
    ) -> Result<bool, ProviderError> {
        if !self.capabilities().allows_rename() || new_name.trim().is_empty() {
            return Ok(false);
        }
        let Some(volume) = self.find_volume(item.path())? else {
            return Ok(false);
        };

        let relabeled = self
            .source
            .relabel(&volume, new_name)
            .map_err(|err| ProviderError::from_io(&volume.mount_point, err))?;
        if relabeled {
            item.relabel(new_name);
        }
        Ok(relabeled)
    }

    fn get_input_stream(&self, path: &Path) -> Result<InputStream, ProviderError> {
        if Self::is_root(path) {
            return Err(unsupported(self, "reading the drive list as a stream"));
        }
        self.disk.get_input_stream(path)
    }

    fn get_output_stream(&self, _path: &Path) -> Result<OutputStream, ProviderError> {
        Err(unsupported(self, "writing"))
    }

    fn normalize_path(&self, path: &str) -> String {
        if path.trim().is_empty() {
            return String::new();
        }
        normalize_separators(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct FixedVolumes {
        volumes: Mutex<Vec<Volume>>,
        relabels: Mutex<Vec<(PathBuf, String)>>,
    }

    impl FixedVolumes {
        fn new(mount_points: &[&Path]) -> Self {
            let volumes = mount_points
                .iter()
                .enumerate()
                .map(|(index, mount_point)| Volume {
                    mount_point: mount_point.to_path_buf(),
                    device: format!("/dev/test{index}"),
                    fs_type: "ext4".to_string(),
                    label: format!("vol{index}"),
                })
                .collect();
            Self {
                volumes: Mutex::new(volumes),
                relabels: Mutex::new(Vec::new()),
            }
        }
    }

    impl VolumeSource for Arc<FixedVolumes> {
        fn volumes(&self) -> io::Result<Vec<Volume>> {
            Ok(self.volumes.lock().expect("poisoned").clone())
        }

        fn relabel(&self, volume: &Volume, label: &str) -> io::Result<bool> {
            self.relabels
                .lock()
                .expect("poisoned")
                .push((volume.mount_point.clone(), label.to_string()));
            let mut volumes = self.volumes.lock().expect("poisoned");
            for candidate in volumes.iter_mut() {
                if candidate.mount_point == volume.mount_point {
                    candidate.label = label.to_string();
                }
            }
            Ok(true)
        }
    }

    #[test]
    fn parses_block_device_mounts() {
        let table = "\
sysfs /sys sysfs rw,nosuid 0 0
/dev/sda1 / ext4 rw,relatime 0 0
/dev/sdb1 /media/My\\040Disk vfat rw 0 0
tmpfs /run tmpfs rw 0 0
/dev/sda1 / ext4 rw,relatime 0 0
";
        let volumes = parse_mount_table(table);

        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].mount_point, PathBuf::from("/"));
        assert_eq!(volumes[0].label, "/");
        assert_eq!(volumes[1].mount_point, PathBuf::from("/media/My Disk"));
        assert_eq!(volumes[1].label, "My Disk");
        assert_eq!(volumes[1].fs_type, "vfat");
    }

    #[test]
    fn root_children_are_volumes() {
        let first = TempDir::new().expect("Failed to create temp directory");
        let second = TempDir::new().expect("Failed to create temp directory");
        let source = Arc::new(FixedVolumes::new(&[first.path(), second.path()]));
        let provider = DriveProvider::with_source(source);

        let root = provider
            .get_item(Path::new(""))
            .expect("Failed to query root")
            .expect("Root always exists");
        assert!(root.is_directory());

        let volumes: Vec<Item> = provider
            .get_child_items(Path::new(""), &Pattern::all())
            .expect("Failed to list volumes")
            .collect::<Result<_, _>>()
            .expect("Failed to read volume");
        assert_eq!(volumes.len(), 2);
        assert!(volumes.iter().all(|v| v.attributes().contains(Attributes::VOLUME)));
        assert_eq!(volumes[0].path(), first.path());

        let filtered = provider
            .get_child_items(Path::new(""), &Pattern::new("vol1").expect("pattern"))
            .expect("Failed to list volumes")
            .count();
        assert_eq!(filtered, 1);
    }

    #[test]
    fn below_a_volume_the_disk_answers() {
        let mount = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(mount.path().join("inside.txt"), "x").expect("Failed to write");
        let provider = DriveProvider::with_source(Arc::new(FixedVolumes::new(&[mount.path()])));

        let children: Vec<Item> = provider
            .get_child_items(mount.path(), &Pattern::all())
            .expect("Failed to list volume")
            .collect::<Result<_, _>>()
            .expect("Failed to read entry");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), "inside.txt");
        let owner = children[0].provider().expect("Disk provider is alive");
        assert_eq!(owner.name(), "disk");
    }

    #[test]
    fn drive_list_is_read_only_but_relabels() {
        let mount = TempDir::new().expect("Failed to create temp directory");
        let source = Arc::new(FixedVolumes::new(&[mount.path()]));
        let provider = DriveProvider::with_source(source.clone());

        assert!(!provider.capabilities().allows_removal());
        assert!(
            !provider
                .remove_item(mount.path(), true)
                .expect("Unsupported is not a fault")
        );
        assert!(
            !provider
                .create_path(&mount.path().join("x"), ItemKind::File)
                .expect("Unsupported is not a fault")
        );

        let mut volume = provider
            .get_item(mount.path())
            .expect("Failed to query volume")
            .expect("Volume exists");
        assert!(
            provider
                .rename_item(&mut volume, "Games", false)
                .expect("Relabel failed")
        );
        assert_eq!(volume.name(), "Games");
        assert_eq!(volume.path(), mount.path());
        assert_eq!(source.relabels.lock().expect("poisoned").len(), 1);
    }

    #[test]
    fn normalize_keeps_the_empty_root() {
        let provider = DriveProvider::with_source(Arc::new(FixedVolumes::new(&[])));
        assert_eq!(provider.normalize_path("   "), "");
        assert_eq!(provider.normalize_path(&provider.normalize_path("  ")), "");
    }
}
