use async_trait::async_trait;
use cpe_monitor::catalog::DEFAULT_CATALOG;
use cpe_monitor::commands::{
    Command, Dispatcher, EVENT_COMMAND_RESULT, EVENT_INBOX_DATA, EVENT_SMS_SENT,
};
use cpe_monitor::coordinator::Coordinator;
use cpe_monitor::error::{CommandError, TransportError};
use cpe_monitor::transport::{ApiRequest, DeviceApi};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every request; `sms/send_msg` fails when `reject_writes` is set.
#[derive(Default)]
struct FakeDevice {
    calls: Mutex<Vec<ApiRequest>>,
    reject_writes: bool,
}

impl FakeDevice {
    fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.method == Method::PUT)
            .collect()
    }
}

#[async_trait]
impl DeviceApi for FakeDevice {
    async fn call(&self, request: ApiRequest) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(request.clone());

        let endpoint = request.endpoint.as_str();
        if request.method == Method::PUT {
            if self.reject_writes {
                return Err(TransportError::DeviceError {
                    status: "fail".to_string(),
                    endpoint: endpoint.to_string(),
                });
            }
            return Ok(json!({"result": "0"}));
        }

        match endpoint {
            "sms/inbox_list" => Ok(json!([{"phone": "+15551234", "content": "hello"}])),
            _ => Ok(json!({ "endpoint": endpoint })),
        }
    }
}

fn dispatcher(device: &Arc<FakeDevice>) -> (Dispatcher, Arc<Coordinator>) {
    let device: Arc<dyn DeviceApi> = device.clone();
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&device),
        DEFAULT_CATALOG,
        Duration::from_secs(30),
    ));
    (Dispatcher::new(device, Arc::clone(&coordinator)), coordinator)
}

#[tokio::test]
async fn test_send_sms_validation_makes_no_calls() {
    let device = Arc::new(FakeDevice::default());
    let (dispatcher, _) = dispatcher(&device);

    let err = dispatcher
        .dispatch("send_sms", &json!({"phone_number": "", "message": "hi"}))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Validation(_)));

    let err = dispatcher
        .dispatch("send_sms", &json!({"phone_number": "+1555", "message": ""}))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Validation(_)));

    let err = dispatcher.dispatch("send_sms", &json!({})).await.unwrap_err();
    assert!(matches!(err, CommandError::Validation(_)));

    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_command_makes_no_calls() {
    let device = Arc::new(FakeDevice::default());
    let (dispatcher, _) = dispatcher(&device);

    let err = dispatcher.dispatch("self_destruct", &json!({})).await.unwrap_err();
    assert_eq!(err, CommandError::UnknownCommand("self_destruct".to_string()));
    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn test_send_sms_encodes_phone_and_notifies() {
    let device = Arc::new(FakeDevice::default());
    let (dispatcher, coordinator) = dispatcher(&device);
    let mut notifications = dispatcher.subscribe();

    let command = Command::send_sms("+15551234", "hello there").unwrap();
    let response = dispatcher.execute(command).await.unwrap();
    assert_eq!(response, json!({"result": "0"}));

    let writes = device.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].endpoint, "sms/send_msg");
    assert_eq!(
        writes[0].body,
        Some(json!({"tagid": "", "phone_nums": "%2B15551234", "message": "hello there"}))
    );

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.event, EVENT_SMS_SENT);
    assert_eq!(notification.data["status"], json!("success"));
    assert_eq!(notification.data["phone_number"], json!("+15551234"));
    assert_eq!(notification.data["response"], json!({"result": "0"}));

    // The follow-up refresh polled the whole catalog
    assert_eq!(coordinator.completed_cycles(), 1);
    assert_eq!(device.calls().len(), 1 + DEFAULT_CATALOG.len());
}

#[tokio::test]
async fn test_failed_sms_notifies_without_refresh() {
    let device = Arc::new(FakeDevice {
        reject_writes: true,
        ..FakeDevice::default()
    });
    let (dispatcher, coordinator) = dispatcher(&device);
    let mut notifications = dispatcher.subscribe();

    let err = dispatcher
        .dispatch("send_sms", &json!({"phone_number": "+15551234", "message": "hi"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Transport(TransportError::DeviceError { .. })
    ));

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.event, EVENT_SMS_SENT);
    assert_eq!(notification.data["status"], json!("failed"));
    assert!(notification.data["error"].as_str().unwrap().contains("fail"));

    assert_eq!(coordinator.completed_cycles(), 0);
}

#[tokio::test]
async fn test_get_inbox_fires_inbox_event() {
    let device = Arc::new(FakeDevice::default());
    let (dispatcher, _) = dispatcher(&device);
    let mut notifications = dispatcher.subscribe();

    let messages = dispatcher.dispatch("get_inbox", &Value::Null).await.unwrap();
    assert_eq!(messages[0]["content"], json!("hello"));
    assert_eq!(device.calls()[0].method, Method::GET);
    assert_eq!(device.calls()[0].endpoint, "sms/inbox_list");

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.event, EVENT_INBOX_DATA);
    assert_eq!(notification.data["messages"], messages);
}

#[tokio::test]
async fn test_clear_boxes_send_fixed_payloads() {
    let device = Arc::new(FakeDevice::default());
    let (dispatcher, _) = dispatcher(&device);

    dispatcher.execute(Command::ClearInbox).await.unwrap();
    dispatcher.execute(Command::ClearOutbox).await.unwrap();

    let writes = device.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[0].body,
        Some(json!({"box": "1", "action": "1", "tagid": "all"}))
    );
    assert_eq!(
        writes[1].body,
        Some(json!({"box": "2", "action": "1", "tagid": "all"}))
    );
    assert!(writes.iter().all(|w| w.endpoint == "sms/send_msg"));
}

#[tokio::test]
async fn test_restart_and_reconnect() {
    let device = Arc::new(FakeDevice::default());
    let (dispatcher, coordinator) = dispatcher(&device);
    let mut notifications = dispatcher.subscribe();

    dispatcher.dispatch("restart", &json!({})).await.unwrap();
    dispatcher.dispatch("reconnect", &json!({})).await.unwrap();

    let writes = device.writes();
    assert_eq!(writes[0].endpoint, "system/reboot");
    assert_eq!(writes[0].body, Some(json!({"action": "reboot"})));
    assert_eq!(writes[1].endpoint, "CMGR/reconnect");
    assert_eq!(writes[1].body, Some(json!({"action": "reconnect"})));

    let first = notifications.recv().await.unwrap();
    assert_eq!(first.event, EVENT_COMMAND_RESULT);
    assert_eq!(first.data["command"], json!("restart"));
    let second = notifications.recv().await.unwrap();
    assert_eq!(second.data["command"], json!("reconnect"));

    assert_eq!(coordinator.completed_cycles(), 2);
}
