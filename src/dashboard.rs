use crate::config::Config;
use crate::edits::apply_edits;
use crate::error::EditError;
use crate::models::{DeviceEdit, DeviceRecord, DeviceView, StatusSummary, DEFAULT_ICON};
use crate::network::NetworkInfo;
use crate::oui::VendorResolver;
use crate::ping::Pinger;
use crate::scanner::{parse_neighbor_lines, NeighborSource};
use crate::store::{Backup, CsvStore};
use crate::view::{classify, format_last_seen, merge_scan, parse_last_seen, MergeOutcome};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Paths {
    pub names: PathBuf,
    pub ip_cache: PathBuf,
    pub last_seen: PathBuf,
    pub icons: PathBuf,
}

impl Paths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            names: config.device_names_path(),
            ip_cache: config.ip_cache_path(),
            last_seen: config.last_detected_path(),
            icons: config.device_icons_path(),
        }
    }
}

/// Ties the store, the neighbor scan, the prober and the vendor lookup together.
pub struct Dashboard {
    store: CsvStore,
    paths: Arc<Paths>,
    vendors: VendorResolver,
    pinger: Arc<dyn Pinger>,
    neighbors: Arc<dyn NeighborSource>,
    network: Option<NetworkInfo>,
}

impl Dashboard {
    pub fn new(
        config: &Config,
        pinger: Arc<dyn Pinger>,
        neighbors: Arc<dyn NeighborSource>,
    ) -> Self {
        let store = CsvStore::new(&config.backup_dir, config.backup_generations);
        let vendors = VendorResolver::from_file(&config.oui_file, store.clone());
        Self {
            paths: Arc::new(Paths::from_config(config)),
            store,
            vendors,
            pinger,
            neighbors,
            network: None,
        }
    }

    pub fn with_vendors(mut self, vendors: VendorResolver) -> Self {
        self.vendors = vendors;
        self
    }

    pub fn with_network(mut self, network: Option<NetworkInfo>) -> Self {
        self.network = network;
        self
    }

    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Runs store work on the blocking pool, since a save may wait on another writer's file lock.
    async fn with_store<T, F>(&self, work: F) -> Option<T>
    where
        F: FnOnce(&CsvStore, &Paths) -> T + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let paths = self.paths.clone();
        match tokio::task::spawn_blocking(move || work(&store, &paths)).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Store task failed: {}", e);
                None
            }
        }
    }

    /// Scans, persists the IP cache and last-seen map, and builds the ordered device view.
    pub async fn refresh(&self) -> DeviceView {
        let (names, ip_cache, last_seen) = self
            .with_store(|store, paths| {
                (
                    store.load(&paths.names),
                    store.load(&paths.ip_cache),
                    store.load(&paths.last_seen),
                )
            })
            .await
            .unwrap_or_default();

        let lines = match self.neighbors.neighbor_lines().await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!("Neighbor scan failed: {:#}", e);
                Vec::new()
            }
        };
        let scan = parse_neighbor_lines(&lines);
        tracing::debug!("Neighbor table listed {} devices", scan.len());

        let now = Local::now();
        let MergeOutcome {
            devices: merged,
            ip_cache,
            last_seen,
        } = merge_scan(&scan, &names, ip_cache, last_seen, now.timestamp());

        let seen = last_seen.clone();
        let icons = self
            .with_store(move |store, paths| {
                if let Err(e) = store.save(&paths.ip_cache, &ip_cache, Backup::Skip) {
                    tracing::warn!("{}", e);
                }
                if let Err(e) = store.save(&paths.last_seen, &seen, Backup::Skip) {
                    tracing::warn!("{}", e);
                }
                store.load(&paths.icons)
            })
            .await
            .unwrap_or_default();

        let mut devices = Vec::with_capacity(merged.len());
        for device in merged {
            let is_alive_now = !device.ip.is_empty() && self.pinger.probe(&device.ip).await;
            let status = classify(&device.ip, is_alive_now, &device.name);
            let seen_at = parse_last_seen(last_seen.get(&device.mac));

            devices.push(DeviceRecord {
                vendor: self.vendors.resolve(&device.mac),
                icon: icons
                    .get(&device.mac)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_ICON.to_string()),
                last_seen: seen_at,
                last_seen_display: format_last_seen(seen_at),
                is_alive_now,
                found_via_arp: device.found_via_arp,
                status,
                status_label: status.as_str(),
                color: status.color(),
                mac: device.mac,
                ip: device.ip,
                name: device.name,
            });
        }

        let summary = StatusSummary::count(&devices);
        DeviceView {
            generated_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            network: self.network.clone(),
            active_devices: devices.iter().filter(|d| d.status.is_alive()).count(),
            summary,
            devices,
        }
    }

    /// Applies name/icon edits and persists both maps with backups.
    ///
    /// Both saves are attempted. If one fails the other is not rolled back.
    /// Blocks on the file locks, so async callers run it on the blocking pool.
    pub fn save_device_edits(&self, edits: &[DeviceEdit]) -> Result<(), EditError> {
        let mut names = self.store.load(&self.paths.names);
        let mut icons = self.store.load(&self.paths.icons);

        apply_edits(&mut names, &mut icons, edits);

        let names_saved = self.store.save(&self.paths.names, &names, Backup::Rotate);
        let icons_saved = self.store.save(&self.paths.icons, &icons, Backup::Rotate);

        names_saved.map_err(EditError::Names)?;
        icons_saved.map_err(EditError::Icons)?;

        tracing::info!("Saved {} device edits", edits.len());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::{DeviceStatus, UNKNOWN_NAME};
    use crate::oui::{OuiTable, RANDOMIZED_VENDOR, UNKNOWN_VENDOR};
    use crate::store::MacMap;
    use std::fs;

    fn dashboard(dir: &std::path::Path, lines: &[&str], alive: &[&str]) -> (Dashboard, Arc<FakePinger>) {
        let config = Config::with_cache_dir(dir);
        let pinger = Arc::new(FakePinger::new(alive));
        let neighbors = Arc::new(FakeNeighbors(lines.iter().map(|l| l.to_string()).collect()));
        let dashboard = Dashboard::new(&config, pinger.clone(), neighbors).with_vendors(
            VendorResolver::with_table(OuiTable::from_pairs([("00-1B-63", "Acme Corp")])),
        );
        (dashboard, pinger)
    }

    #[tokio::test]
    async fn single_unknown_device_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (dashboard, _) = dashboard(
            dir.path(),
            &["? (192.168.1.5) at aa:bb:cc:dd:ee:ff on en0"],
            &["192.168.1.5"],
        );

        let view = dashboard.refresh().await;
        assert_eq!(view.devices.len(), 1);

        let device = &view.devices[0];
        assert_eq!(device.mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(device.name, UNKNOWN_NAME);
        assert_eq!(device.icon, DEFAULT_ICON);
        assert_eq!(device.vendor, RANDOMIZED_VENDOR);
        assert_eq!(device.status, DeviceStatus::AliveUnregistered);
        assert!(device.found_via_arp);
        assert!(device.last_seen.is_some());
        assert_eq!(view.active_devices, 1);

        let store = dashboard.store();
        let cache = store.load(&dashboard.paths().ip_cache);
        assert_eq!(cache["aa:bb:cc:dd:ee:ff"], "192.168.1.5");
        let seen = store.load(&dashboard.paths().last_seen);
        assert!(seen.contains_key("aa:bb:cc:dd:ee:ff"));
    }

    #[tokio::test]
    async fn refresh_waits_for_locked_cache_without_stalling_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let (dashboard, _) = dashboard(
            dir.path(),
            &["? (192.168.1.5) at 00:1b:63:00:00:05 on en0"],
            &["192.168.1.5"],
        );
        let dashboard = Arc::new(dashboard);

        let holder = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&dashboard.paths().ip_cache)
            .unwrap();
        holder.lock().unwrap();

        let refresh = tokio::spawn({
            let dashboard = dashboard.clone();
            async move { dashboard.refresh().await }
        });

        // A single-threaded runtime only gets here if the save is off the async worker.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!refresh.is_finished());

        holder.unlock().unwrap();
        let view = refresh.await.unwrap();
        assert_eq!(view.devices.len(), 1);
        let cache = dashboard.store().load(&dashboard.paths().ip_cache);
        assert_eq!(cache["00:1b:63:00:00:05"], "192.168.1.5");
    }

    #[tokio::test]
    async fn unreachable_device_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (dashboard, _) = dashboard(
            dir.path(),
            &["? (192.168.1.5) at aa:bb:cc:dd:ee:ff on en0"],
            &[],
        );
        let view = dashboard.refresh().await;
        assert_eq!(view.devices[0].status, DeviceStatus::StoppedUnregistered);
        assert_eq!(view.devices[0].color, "red");
    }

    #[tokio::test]
    async fn known_devices_without_ip_are_not_probed() {
        let dir = tempfile::tempdir().unwrap();
        let (dashboard, pinger) = dashboard(dir.path(), &[], &[]);

        let mut names = MacMap::new();
        names.insert("02:11:22:33:44:55".into(), "Phone".into());
        dashboard
            .store()
            .save(&dashboard.paths().names, &names, Backup::Skip)
            .unwrap();

        let view = dashboard.refresh().await;
        let device = &view.devices[0];
        assert_eq!(device.ip, "");
        assert_eq!(device.status, DeviceStatus::StoppedRegistered);
        assert_eq!(view.active_devices, 0);
        assert_eq!(device.vendor, RANDOMIZED_VENDOR);
        assert_eq!(device.last_seen_display, "never");
        assert!(pinger.probed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_scan_still_lists_cached_devices() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_cache_dir(dir.path());
        let dashboard = Dashboard::new(
            &config,
            Arc::new(FakePinger::new(&["10.0.0.7"])),
            Arc::new(FailingNeighbors),
        )
        .with_vendors(VendorResolver::with_table(OuiTable::default()));

        fs::create_dir_all(dir.path()).unwrap();
        fs::write(config.ip_cache_path(), "0:1:2:3:4:5,10.0.0.7\n").unwrap();

        let view = dashboard.refresh().await;
        assert_eq!(view.devices.len(), 1);
        assert_eq!(view.devices[0].mac, "00:01:02:03:04:05");
        assert_eq!(view.devices[0].vendor, UNKNOWN_VENDOR);
        assert_eq!(view.devices[0].status, DeviceStatus::AliveUnregistered);
        assert!(!view.devices[0].found_via_arp);
    }

    #[tokio::test]
    async fn edits_show_up_in_next_view() {
        let dir = tempfile::tempdir().unwrap();
        let (dashboard, _) = dashboard(
            dir.path(),
            &["? (192.168.1.1) at 0:1b:63:0:0:1 on en0"],
            &["192.168.1.1"],
        );

        dashboard
            .save_device_edits(&[DeviceEdit {
                mac: "00:1B:63:00:00:01".into(),
                name: Some("Router".into()),
                icon: Some("router.png".into()),
            }])
            .unwrap();

        let view = dashboard.refresh().await;
        let device = &view.devices[0];
        assert_eq!(device.name, "Router");
        assert_eq!(device.icon, "router.png");
        assert_eq!(device.vendor, "Acme Corp");
        assert_eq!(device.status, DeviceStatus::AliveRegistered);
        assert_eq!(view.summary.alive_registered, 1);
    }

    #[tokio::test]
    async fn clearing_a_name_reverts_to_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let (dashboard, _) = dashboard(dir.path(), &[], &[]);
        let mac = "aa:bb:cc:00:00:02";

        dashboard
            .save_device_edits(&[DeviceEdit {
                mac: mac.into(),
                name: Some("Printer".into()),
                icon: None,
            }])
            .unwrap();
        assert_eq!(dashboard.store().load(&dashboard.paths().names)[mac], "Printer");

        dashboard
            .save_device_edits(&[DeviceEdit {
                mac: mac.into(),
                name: Some(String::new()),
                icon: None,
            }])
            .unwrap();
        assert!(!dashboard
            .store()
            .load(&dashboard.paths().names)
            .contains_key(mac));
    }

    #[test]
    fn edit_saves_rotate_backups() {
        let dir = tempfile::tempdir().unwrap();
        let (dashboard, _) = dashboard(dir.path(), &[], &[]);
        let edit = DeviceEdit {
            mac: "aa:bb:cc:00:00:03".into(),
            name: Some("NAS".into()),
            icon: Some("nas.png".into()),
        };

        dashboard.save_device_edits(&[edit.clone()]).unwrap();
        dashboard.save_device_edits(&[edit]).unwrap();

        let backups: Vec<String> = fs::read_dir(dashboard.store().backup_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(backups.iter().any(|name| name.starts_with("device_names_")));
        assert!(backups.iter().any(|name| name.starts_with("device_icons_")));
    }

    #[test]
    fn failed_icon_save_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let (dashboard, _) = dashboard(dir.path(), &[], &[]);
        // A directory where the icon file should be makes opening it fail.
        fs::create_dir_all(&dashboard.paths().icons).unwrap();

        let result = dashboard.save_device_edits(&[DeviceEdit {
            mac: "aa:bb:cc:00:00:04".into(),
            name: Some("Camera".into()),
            icon: Some("camera.png".into()),
        }]);

        assert!(matches!(result, Err(EditError::Icons(_))));
        // No rollback: the name map was written.
        assert_eq!(
            dashboard.store().load(&dashboard.paths().names)["aa:bb:cc:00:00:04"],
            "Camera"
        );
    }
}
