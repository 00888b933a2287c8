//! End-to-end scenarios against the aggregator.

use crate::config::ServiceConfig;
use crate::ontology::network::{
    ConnectionDirection, NetworkConnection, TransportLayerProtocol,
};
use crate::ontology::objectid::{ObjectId, ObjectIdUpdate};
use crate::ontology::process::{normalize_path, Process, ProcessUpdate};
use crate::ontology::results::{ObjectIdParams, OntologyResults, ProcessParams};
use crate::ontology::sandbox::{AnalysisMetadata, Sandbox};
use crate::ontology::signature::{Attribute, Signature, SignatureType};
use crate::time::OntTime;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn guid(n: u32) -> String {
    format!("{{12345678-1234-5678-1234-{:012x}}}", n)
}

fn time(value: &str) -> OntTime {
    OntTime::parse(value).unwrap()
}

fn make_process(guid_n: u32, pid: u32, ppid: Option<u32>, image: &str, start: &str) -> Process {
    let mut objectid = ObjectId::new(&normalize_path(image, None), "blah", "blah-service").unwrap();
    objectid.set_guid(&guid(guid_n)).unwrap();
    objectid.set_time_observed(start).unwrap();
    let mut process = Process::new(objectid, image).unwrap();
    process.pid = Some(pid);
    process.ppid = ppid;
    process.set_start_time(time(start));
    process
}

fn make_connection(guid_n: u32, destination_ip: &str, destination_port: u16, observed: &str) -> NetworkConnection {
    let tag = NetworkConnection::create_tag(
        destination_ip,
        destination_port,
        ConnectionDirection::Outbound,
        None,
    );
    let mut objectid = ObjectId::new(&tag, "blah", "blah-service").unwrap();
    objectid.set_guid(&guid(guid_n)).unwrap();
    objectid.set_time_observed(observed).unwrap();
    NetworkConnection::new(
        objectid,
        destination_ip,
        destination_port,
        TransportLayerProtocol::Tcp,
        ConnectionDirection::Outbound,
    )
    .unwrap()
}

// ============================================================
// Configuration
// ============================================================

#[test]
fn test_config_supplies_service_name_for_objectids() {
    init_logging();
    let config = ServiceConfig::new("blah-service").with_injection_heur_id(42);
    assert_eq!(config.injection_heur_id, 42);

    let ontres = OntologyResults::with_config(&config);
    let objectid = ontres
        .create_objectid("blah.exe", "blah", ObjectIdParams::default())
        .unwrap();
    assert_eq!(objectid.service_name(), "blah-service");
    assert_eq!(objectid.tag(), "blah.exe");
}

// ============================================================
// Factories
// ============================================================

#[test]
fn test_create_process_stamps_guid_and_observed_time() {
    let ontres = OntologyResults::new(Some("blah-service"));
    let objectid = ontres
        .create_objectid("?c\\bad.exe", "blah", ObjectIdParams::default())
        .unwrap();
    let process = ontres
        .create_process(
            objectid,
            "C:\\bad.exe",
            time("2023-02-01 09:00:00"),
            ProcessParams {
                pid: Some(10),
                ..Default::default()
            },
        )
        .unwrap();

    assert!(process.objectid.guid().is_some());
    assert_eq!(
        process.objectid.time_observed().unwrap().to_string(),
        "2023-02-01 09:00:00"
    );
    assert!(process.end_time.unwrap().is_max());
}

#[test]
fn test_create_process_validates_at_construction() {
    let ontres = OntologyResults::new(Some("blah-service"));

    let objectid = ontres
        .create_objectid("?c\\bad.exe", "blah", ObjectIdParams::default())
        .unwrap();
    let self_parent = ontres.create_process(
        objectid,
        "C:\\bad.exe",
        time("2023-02-01 09:00:00"),
        ProcessParams {
            pid: Some(10),
            ppid: Some(10),
            ..Default::default()
        },
    );
    assert!(self_parent.is_err());

    let objectid = ontres
        .create_objectid("?c\\bad.exe", "blah", ObjectIdParams::default())
        .unwrap();
    let ends_before_start = ontres.create_process(
        objectid,
        "C:\\bad.exe",
        time("2023-02-01 09:00:00"),
        ProcessParams {
            end_time: Some(time("2023-02-01 08:00:00")),
            ..Default::default()
        },
    );
    assert!(ends_before_start.is_err());
}

#[test]
fn test_created_children_always_attach_in_the_tree() {
    // a hand-built child without an observed time would defeat the time sort
    // and root itself; the factory makes that state unreachable
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let parent_objectid = ontres
        .create_objectid(
            "?c\\a.exe",
            "blah",
            ObjectIdParams {
                guid: Some(guid(1)),
                ..Default::default()
            },
        )
        .unwrap();
    let parent = ontres
        .create_process(
            parent_objectid,
            "C:\\a.exe",
            time("2023-02-01 09:00:00"),
            ProcessParams {
                pid: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
    ontres.add_process(parent).unwrap();

    let child_objectid = ontres
        .create_objectid("?c\\b.exe", "blah", ObjectIdParams::default())
        .unwrap();
    let child = ontres
        .create_process(
            child_objectid,
            "C:\\b.exe",
            time("2023-02-01 09:00:01"),
            ProcessParams {
                pid: Some(2),
                ppid: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(child.objectid.time_observed().is_some());
    ontres.add_process(child).unwrap();

    let tree = ontres.get_process_tree(&[]);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].event.objectid().guid(), Some(guid(1).as_str()));
    assert_eq!(tree[0].children.len(), 1);
}

#[test]
fn test_entity_factories_enforce_required_fields() {
    let ontres = OntologyResults::new(Some("blah-service"));
    let objectid = ontres
        .create_objectid("10.0.0.1:80", "blah", ObjectIdParams::default())
        .unwrap();
    let connection = ontres
        .create_network_connection(
            objectid,
            "10.0.0.1",
            80,
            TransportLayerProtocol::Tcp,
            ConnectionDirection::Outbound,
        )
        .unwrap();
    assert!(connection.objectid.guid().is_some());

    let objectid = ontres
        .create_objectid("10.0.0.1:80", "blah", ObjectIdParams::default())
        .unwrap();
    assert!(ontres
        .create_network_connection(
            objectid,
            "",
            80,
            TransportLayerProtocol::Tcp,
            ConnectionDirection::Outbound,
        )
        .is_err());

    assert!(OntologyResults::create_network_dns("", vec![], "A").is_err());
    assert!(
        OntologyResults::create_network_http("http://site.com/", "GET", Default::default()).is_ok()
    );
    let sandbox = OntologyResults::create_sandbox(
        ontres
            .create_objectid("CAPE", "blah", ObjectIdParams::default())
            .unwrap(),
        "CAPE",
        None,
    );
    assert!(sandbox.analysis_metadata.start_time.is_min());
}

// ============================================================
// Dedup ladder
// ============================================================

#[test]
fn test_add_process_rejects_tracked_guid() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres
        .add_process(make_process(1, 10, None, "C:\\bad.exe", "2023-02-01 09:00:00"))
        .unwrap();
    // same GUID and same PID: duplicate record
    ontres
        .add_process(make_process(1, 10, None, "C:\\bad.exe", "2023-02-01 09:00:00"))
        .unwrap();
    assert_eq!(ontres.get_processes().len(), 1);

    // a tracked GUID is rejected even with a fresh PID; no two tracked
    // processes may share a GUID
    ontres
        .add_process(make_process(1, 11, None, "C:\\bad.exe", "2023-02-01 09:05:00"))
        .unwrap();
    assert_eq!(ontres.get_processes().len(), 1);
    assert_eq!(ontres.get_process_by_guid(&guid(1)).unwrap().pid, Some(10));
}

#[test]
fn test_pid_reuse_windows() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let mut first = make_process(1, 10, None, "C:\\bad.exe", "2023-02-01 09:00:00");
    first.set_end_time(time("2023-02-01 09:05:00"));
    ontres.add_process(first).unwrap();

    // identical window: duplicate record
    let mut duplicate = make_process(2, 10, None, "C:\\bad.exe", "2023-02-01 09:00:00");
    duplicate.set_end_time(time("2023-02-01 09:05:00"));
    ontres.add_process(duplicate).unwrap();
    assert_eq!(ontres.get_processes().len(), 1);

    // disjoint window: legitimate PID reuse
    ontres
        .add_process(make_process(3, 10, None, "C:\\other.exe", "2023-02-01 09:06:00"))
        .unwrap();
    assert_eq!(ontres.get_processes().len(), 2);

    // overlapping window: conflicting record
    ontres
        .add_process(make_process(4, 10, None, "C:\\bad.exe", "2023-02-01 09:03:00"))
        .unwrap();
    assert_eq!(ontres.get_processes().len(), 2);
}

#[test]
fn test_add_process_rejects_self_parent() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let process = make_process(1, 10, Some(10), "C:\\bad.exe", "2023-02-01 09:00:00");
    assert!(ontres.add_process(process).is_err());
}

// ============================================================
// Parent and child linking
// ============================================================

#[test]
fn test_child_inherits_parent_details_by_ppid() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let mut parent = make_process(1, 1, None, "C:\\Windows\\explorer.exe", "2023-02-01 09:00:00");
    parent.command_line = Some("explorer.exe".to_string());
    ontres.add_process(parent).unwrap();

    ontres
        .add_process(make_process(2, 2, Some(1), "C:\\bad.exe", "2023-02-01 09:01:00"))
        .unwrap();

    let child = ontres.get_process_by_guid(&guid(2)).unwrap();
    assert_eq!(child.pimage.as_deref(), Some("C:\\Windows\\explorer.exe"));
    assert_eq!(child.pcommand_line.as_deref(), Some("explorer.exe"));
    assert_eq!(
        child.pobjectid.as_ref().and_then(|p| p.guid()),
        Some(guid(1).as_str())
    );
}

#[test]
fn test_late_parent_adopts_children_by_guid() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let mut child = make_process(2, 2, None, "C:\\bad.exe", "2023-02-01 09:01:00");
    let mut pobjectid = ObjectId::new("?win\\explorer.exe", "blah", "blah-service").unwrap();
    pobjectid.set_guid(&guid(1)).unwrap();
    child.pobjectid = Some(pobjectid);
    ontres.add_process(child).unwrap();

    ontres
        .add_process(make_process(1, 1, None, "C:\\Windows\\explorer.exe", "2023-02-01 09:00:00"))
        .unwrap();

    let child = ontres.get_process_by_guid(&guid(2)).unwrap();
    assert_eq!(child.pimage.as_deref(), Some("C:\\Windows\\explorer.exe"));
    assert_eq!(child.ppid, Some(1));
}

#[test]
fn test_parent_pick_at_pid_reuse_boundary() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let mut old = make_process(1, 7, None, "C:\\old.exe", "2023-02-01 09:00:00");
    old.set_end_time(time("2023-02-01 09:20:00"));
    ontres.add_process(old).unwrap();
    ontres
        .add_process(make_process(2, 7, None, "C:\\new.exe", "2023-02-01 09:20:00"))
        .unwrap();

    // both windows contain the boundary instant, so the general lookup
    // refuses to guess
    assert!(ontres
        .get_process_by_pid_and_time(7, time("2023-02-01 09:20:00"))
        .is_none());

    // parent resolution picks the most recently started candidate instead
    ontres
        .add_process(make_process(3, 8, Some(7), "C:\\bad.exe", "2023-02-01 09:20:00"))
        .unwrap();
    let child = ontres.get_process_by_guid(&guid(3)).unwrap();
    assert_eq!(
        child.pobjectid.as_ref().and_then(|p| p.guid()),
        Some(guid(2).as_str())
    );
    assert_eq!(child.pimage.as_deref(), Some("C:\\new.exe"));
}

// ============================================================
// Tree building
// ============================================================

#[test]
fn test_process_tree_with_network_leaf() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres
        .add_process(make_process(1, 1, None, "C:\\a.exe", "2023-02-01 09:00:00"))
        .unwrap();
    ontres
        .add_process(make_process(2, 2, Some(1), "C:\\b.exe", "2023-02-01 09:00:01"))
        .unwrap();
    ontres
        .add_process(make_process(3, 3, Some(2), "C:\\c.exe", "2023-02-01 09:00:02"))
        .unwrap();
    ontres
        .add_process(make_process(4, 4, None, "C:\\d.exe", "2023-02-01 09:00:03"))
        .unwrap();

    let mut connection = make_connection(5, "10.0.0.1", 80, "2023-02-01 09:00:04");
    connection.set_process(ontres.get_process_by_guid(&guid(2)).unwrap().clone());
    ontres.add_network_connection(connection);

    let tree = ontres.get_process_tree(&[]);
    assert_eq!(tree.len(), 2);

    let a = &tree[0];
    assert_eq!(a.event.objectid().guid(), Some(guid(1).as_str()));
    assert_eq!(a.children.len(), 1);
    let b = &a.children[0];
    // b has the process child c and the network connection leaf
    assert_eq!(b.children.len(), 2);
    assert!(b.children.iter().any(|n| n.event.as_process().is_none()));

    let d = &tree[1];
    assert_eq!(d.event.objectid().guid(), Some(guid(4).as_str()));
    assert!(d.children.is_empty());
}

#[test]
fn test_siblings_with_tied_timestamps_and_later_grandchild() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres
        .add_process(make_process(1, 1, None, "C:\\a.exe", "2023-02-01 09:00:00"))
        .unwrap();
    ontres
        .add_process(make_process(2, 2, Some(1), "C:\\b.exe", "2023-02-01 09:00:01"))
        .unwrap();
    ontres
        .add_process(make_process(3, 3, Some(1), "C:\\c.exe", "2023-02-01 09:00:01"))
        .unwrap();
    ontres
        .add_process(make_process(4, 4, Some(2), "C:\\d.exe", "2023-02-01 09:00:02"))
        .unwrap();

    let tree = ontres.get_process_tree(&[]);
    assert_eq!(tree.len(), 1);
    let a = &tree[0];
    assert_eq!(a.event.objectid().guid(), Some(guid(1).as_str()));
    assert_eq!(a.children.len(), 2);
    let b = a
        .children
        .iter()
        .find(|n| n.event.objectid().guid() == Some(guid(2).as_str()))
        .unwrap();
    assert_eq!(b.children.len(), 1);
    assert_eq!(b.children[0].event.objectid().guid(), Some(guid(4).as_str()));
    let c = a
        .children
        .iter()
        .find(|n| n.event.objectid().guid() == Some(guid(3).as_str()))
        .unwrap();
    assert!(c.children.is_empty());
}

#[test]
fn test_treeids_written_back_and_stable() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres
        .add_process(make_process(1, 1, None, "C:\\a.exe", "2023-02-01 09:00:00"))
        .unwrap();
    ontres
        .add_process(make_process(2, 2, Some(1), "C:\\b.exe", "2023-02-01 09:00:01"))
        .unwrap();

    ontres.get_process_tree(&[]);
    let first: Vec<Option<String>> = ontres
        .get_processes()
        .iter()
        .map(|p| p.objectid.treeid().map(str::to_string))
        .collect();
    assert!(first.iter().all(Option::is_some));

    ontres.get_process_tree(&[]);
    let second: Vec<Option<String>> = ontres
        .get_processes()
        .iter()
        .map(|p| p.objectid.treeid().map(str::to_string))
        .collect();
    assert_eq!(first, second);

    let child = ontres.get_process_by_guid(&guid(2)).unwrap();
    assert_eq!(child.objectid.processtree(), Some("?c\\a.exe|?c\\b.exe"));
}

#[test]
fn test_tree_shape_is_insertion_order_independent() {
    let times = [
        "2023-02-01 09:00:00",
        "2023-02-01 09:00:00",
        "2023-02-01 09:00:00",
    ];
    let build = |order: &[u32]| {
        let mut ontres = OntologyResults::new(Some("blah-service"));
        for &n in order {
            let ppid = if n == 1 { None } else { Some(n - 1) };
            ontres
                .add_process(make_process(
                    n,
                    n,
                    ppid,
                    &format!("C:\\p{}.exe", n),
                    times[(n - 1) as usize],
                ))
                .unwrap();
        }
        ontres
            .get_process_tree(&[])
            .iter()
            .map(|root| root.event.objectid().tag().to_string())
            .collect::<Vec<_>>()
    };

    // every event shares a timestamp; relationship sorting still roots the
    // chain at the real ancestor
    assert_eq!(build(&[1, 2, 3]), vec!["?c\\p1.exe"]);
    assert_eq!(build(&[2, 1, 3]), vec!["?c\\p1.exe"]);
}

// ============================================================
// Safelisting and preprocessing
// ============================================================

#[test]
fn test_remove_safelisted_processes_cascades() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let mut process = make_process(1, 1, None, "C:\\clean.exe", "2023-02-01 09:00:00");
    process.objectid.set_treeid("safe-hash".to_string());
    ontres.add_process(process).unwrap();

    let source = ontres.get_process_by_guid(&guid(1)).unwrap().objectid.clone();
    let mut signature = Signature::new(
        ObjectId::new("sig", "blah", "blah-service").unwrap(),
        "clean_behaviour",
        SignatureType::Cuckoo,
    )
    .unwrap();
    signature.add_attribute(Attribute::new(source));
    ontres.add_signature(signature);

    let mut connection = make_connection(2, "10.0.0.1", 80, "2023-02-01 09:00:01");
    connection.set_process(ontres.get_process_by_guid(&guid(1)).unwrap().clone());
    ontres.add_network_connection(connection);

    ontres.remove_safelisted_processes(&["safe-hash".to_string()], false);
    assert!(ontres.get_processes().is_empty());
    assert!(ontres.get_signatures().is_empty());
    assert!(ontres.get_network_connections().is_empty());
}

#[test]
fn test_preprocess_clamps_sentinel_times_to_analysis_window() {
    let mut ontres = OntologyResults::new(Some("blah-service"));

    let mut sandbox_objectid = ObjectId::new("CAPE", "blah", "blah-service").unwrap();
    sandbox_objectid.set_session("sess1".to_string());
    ontres.add_sandbox(Sandbox::new(
        sandbox_objectid,
        AnalysisMetadata {
            start_time: time("2023-02-01 09:00:00"),
            end_time: time("2023-02-01 10:00:00"),
            ..Default::default()
        },
        "CAPE",
    ));

    let mut process = make_process(1, 1, None, "C:\\bad.exe", "2023-02-01 09:30:00");
    process.objectid.set_session("sess1".to_string());
    process.objectid.set_treeid("keep".to_string());
    process.set_start_time(OntTime::min_sentinel());
    process.set_end_time(OntTime::max_sentinel());
    ontres.add_process(process).unwrap();

    ontres.preprocess_ontology(&[]);
    let process = ontres.get_process_by_guid(&guid(1)).unwrap();
    assert_eq!(process.start_time.unwrap().to_string(), "2023-02-01 09:00:00");
    assert_eq!(process.end_time.unwrap().to_string(), "2023-02-01 10:00:00");
}

#[test]
fn test_preprocess_drops_processes_without_treeids() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres
        .add_process(make_process(1, 1, None, "C:\\bad.exe", "2023-02-01 09:00:00"))
        .unwrap();
    let mut kept = make_process(2, 2, None, "C:\\worse.exe", "2023-02-01 09:01:00");
    kept.objectid.set_treeid("present".to_string());
    ontres.add_process(kept).unwrap();

    ontres.preprocess_ontology(&[]);
    assert_eq!(ontres.get_processes().len(), 1);
    assert_eq!(
        ontres.get_processes()[0].objectid.guid(),
        Some(guid(2).as_str())
    );
}

// ============================================================
// Updates and lookups
// ============================================================

#[test]
fn test_update_process_by_pid_and_time() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres
        .add_process(make_process(1, 10, None, "C:\\bad.exe", "2023-02-01 09:00:00"))
        .unwrap();

    ontres.update_process(ProcessUpdate {
        pid: Some(10),
        start_time: Some(time("2023-02-01 09:00:30")),
        command_line: Some("bad.exe --payload".to_string()),
        ..Default::default()
    });

    let process = ontres.get_process_by_guid(&guid(1)).unwrap();
    assert_eq!(process.command_line.as_deref(), Some("bad.exe --payload"));
}

#[test]
fn test_update_process_locates_by_pid_and_end_time() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres
        .add_process(make_process(1, 10, None, "C:\\bad.exe", "2023-02-01 09:00:00"))
        .unwrap();

    // no start time in the update; the end time locates the open window
    ontres.update_process(ProcessUpdate {
        pid: Some(10),
        end_time: Some(time("2023-02-01 09:30:00")),
        command_line: Some("bad.exe --cleanup".to_string()),
        ..Default::default()
    });

    let process = ontres.get_process_by_guid(&guid(1)).unwrap();
    assert_eq!(process.command_line.as_deref(), Some("bad.exe --cleanup"));
    assert_eq!(process.end_time.unwrap().to_string(), "2023-02-01 09:30:00");
}

#[test]
fn test_update_process_inserts_untracked_process() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres.update_process(ProcessUpdate {
        objectid: Some(ObjectIdUpdate {
            tag: Some("?c\\new.exe".to_string()),
            ontology_id: Some("blah".to_string()),
            guid: Some(guid(5)),
            ..Default::default()
        }),
        image: Some("C:\\new.exe".to_string()),
        start_time: Some(time("2023-02-01 09:00:00")),
        pid: Some(12),
        ..Default::default()
    });

    assert_eq!(ontres.get_processes().len(), 1);
    let process = ontres.get_process_by_guid(&guid(5)).unwrap();
    assert_eq!(process.pid, Some(12));
    assert_eq!(process.image, "C:\\new.exe");

    // an update that names nobody and cannot build a record stays a no-op
    ontres.update_process(ProcessUpdate {
        pid: Some(99),
        start_time: Some(time("2023-02-01 09:00:00")),
        ..Default::default()
    });
    assert_eq!(ontres.get_processes().len(), 1);
}

#[test]
fn test_get_signatures_by_pid_falls_back_to_ontology_id() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let mut objectid = ObjectId::new("?c\\bad.exe", "process_blah_1", "blah-service").unwrap();
    objectid.set_guid(&guid(1)).unwrap();
    let mut process = Process::new(objectid, "C:\\bad.exe").unwrap();
    process.pid = Some(10);
    process.set_start_time(time("2023-02-01 09:00:00"));
    ontres.add_process(process).unwrap();

    // the attribute source carries no GUID, only the ontology id
    let source = ObjectId::new("?c\\bad.exe", "process_blah_1", "blah-service").unwrap();
    let mut signature = Signature::new(
        ObjectId::new("sig", "blah", "blah-service").unwrap(),
        "bad_behaviour",
        SignatureType::Cuckoo,
    )
    .unwrap();
    signature.add_attribute(Attribute::new(source));
    ontres.add_signature(signature);

    assert_eq!(ontres.get_signatures_by_pid(10).len(), 1);
    assert!(ontres.get_signatures_by_pid(11).is_empty());
}

#[test]
fn test_update_objectid_reaches_network_connections() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres.add_network_connection(make_connection(9, "10.0.0.1", 443, "2023-02-01 09:00:00"));

    ontres.update_objectid(ObjectIdUpdate {
        guid: Some(guid(9)),
        treeid: Some("net-hash".to_string()),
        ..Default::default()
    });
    let connection = ontres.get_network_connection_by_guid(&guid(9)).unwrap();
    assert_eq!(connection.objectid.treeid(), Some("net-hash"));
}

#[test]
fn test_network_connection_lookup_accepts_https_upgrade() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres.add_network_connection(make_connection(1, "10.0.0.1", 443, "2023-02-01 09:00:00"));

    // a port 80 request that was observed after its TLS upgrade
    let found = ontres.get_network_connection_by_details(
        "10.0.0.1",
        80,
        ConnectionDirection::Outbound,
        TransportLayerProtocol::Tcp,
    );
    assert!(found.is_some());

    let missing = ontres.get_network_connection_by_details(
        "10.0.0.1",
        8080,
        ConnectionDirection::Outbound,
        TransportLayerProtocol::Tcp,
    );
    assert!(missing.is_none());
}

#[test]
fn test_dns_lookups_by_ip_and_domain() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    ontres.add_network_dns(
        crate::ontology::NetworkDns::new("site.com", vec!["10.0.0.1".to_string()], "A").unwrap(),
    );
    assert_eq!(ontres.get_domain_by_destination_ip("10.0.0.1"), Some("site.com"));
    assert_eq!(ontres.get_destination_ip_by_domain("site.com"), Some("10.0.0.1"));
    assert_eq!(ontres.get_domain_by_destination_ip("10.0.0.2"), None);
}

#[test]
fn test_create_session_is_alphanumeric() {
    let session = OntologyResults::create_session();
    assert_eq!(session.len(), 22);
    assert!(session.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(session, OntologyResults::create_session());
}

// ============================================================
// Result section rendering
// ============================================================

#[test]
fn test_process_tree_result_section_tags_and_safelisting() {
    let mut ontres = OntologyResults::new(Some("blah-service"));
    let mut parent = make_process(1, 1, None, "C:\\a.exe", "2023-02-01 09:00:00");
    parent.command_line = Some("a.exe".to_string());
    ontres.add_process(parent).unwrap();
    let mut child = make_process(2, 2, Some(1), "C:\\b.exe", "2023-02-01 09:00:01");
    child.command_line = Some("b.exe --run".to_string());
    ontres.add_process(child).unwrap();

    let mut signature = Signature::new(
        ObjectId::new("sig", "blah", "blah-service").unwrap(),
        "bad_behaviour",
        SignatureType::Cuckoo,
    )
    .unwrap();
    signature.set_score(100);
    let source = ontres.get_process_by_guid(&guid(2)).unwrap().objectid.clone();
    signature.add_attribute(Attribute::new(source));
    ontres.add_signature(signature);

    let section = ontres.get_process_tree_result_section(&[]);
    assert_eq!(section.processes.len(), 1);
    let root_item = &section.processes[0];
    assert_eq!(root_item.pid, 1);
    assert_eq!(root_item.children.len(), 1);
    assert_eq!(root_item.children[0].signatures["bad_behaviour"], 100);
    assert_eq!(section.tags["dynamic.processtree_id"].len(), 2);
    assert!(section.tags["dynamic.process.command_line"]
        .contains(&"b.exe --run".to_string()));

    // safelist the child: it stays in the tree but contributes no tags
    let mut ontres2 = OntologyResults::new(Some("blah-service"));
    ontres2
        .add_process(make_process(1, 1, None, "C:\\a.exe", "2023-02-01 09:00:00"))
        .unwrap();
    ontres2
        .add_process(make_process(2, 2, Some(1), "C:\\b.exe", "2023-02-01 09:00:01"))
        .unwrap();
    ontres2.get_process_tree(&[]);
    let child_treeid = ontres2
        .get_process_by_guid(&guid(2))
        .unwrap()
        .objectid
        .treeid()
        .unwrap()
        .to_string();
    let section = ontres2.get_process_tree_result_section(&[child_treeid]);
    assert_eq!(section.processes.len(), 1);
    assert!(section.processes[0].children.is_empty());
    assert_eq!(section.tags["dynamic.processtree_id"].len(), 1);
}
