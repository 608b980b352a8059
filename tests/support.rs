//! Shared fixtures for the integration tests in `tests/rpc.rs`: a
//! `Calculator`-style handler for the single-connection scenarios, a
//! pair of handlers for the bidirectional scenario, and a loopback
//! client/server harness built on `crazyrpc::tcp`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crazyrpc::rpc::{Connection, RpcFutureExt, RpcTable};
use crazyrpc::tcp::{connect, RpcTcpListener};

/// Server-side handler for the arithmetic, string, stateful void/no-reply,
/// and always-fails scenarios.
#[derive(Default)]
pub struct Calculator {
    text: Mutex<String>,
}

impl Calculator {
    async fn add(&self, (a, b): (i32, i32)) -> anyhow::Result<i32> {
        Ok(a + b)
    }

    async fn subtract(&self, (a, b): (i32, i32)) -> anyhow::Result<i32> {
        Ok(a - b)
    }

    async fn multiply(&self, (a, b): (i32, i32)) -> anyhow::Result<i32> {
        Ok(a * b)
    }

    async fn add_strings(&self, (a, b): (String, String)) -> anyhow::Result<String> {
        Ok(format!("{a}{b}"))
    }

    async fn set_text(&self, (text,): (String,)) -> anyhow::Result<()> {
        *self.text.lock().expect("calculator mutex poisoned") = text;
        Ok(())
    }

    async fn get_text(&self, (): ()) -> anyhow::Result<String> {
        Ok(self.text.lock().expect("calculator mutex poisoned").clone())
    }

    async fn broken(&self, (_v,): (i32,)) -> anyhow::Result<i32> {
        Err(anyhow::anyhow!("Failed rpc"))
    }
}

pub fn calculator_table() -> Arc<RpcTable<Calculator>> {
    Arc::new(
        RpcTable::builder()
            .register("add", true, |t: Arc<Calculator>, p| async move { t.add(p).await })
            .register("subtract", true, |t: Arc<Calculator>, p| async move { t.subtract(p).await })
            .register("multiply", true, |t: Arc<Calculator>, p| async move { t.multiply(p).await })
            .register("addStrings", true, |t: Arc<Calculator>, p| async move { t.add_strings(p).await })
            .register("setText", false, |t: Arc<Calculator>, p| async move { t.set_text(p).await })
            .register("getText", true, |t: Arc<Calculator>, p| async move { t.get_text(p).await })
            .register("broken", true, |t: Arc<Calculator>, p| async move { t.broken(p).await })
            .build(),
    )
}

/// Spins up a listener on an ephemeral loopback port, accepts exactly one
/// connection against `table`/`make_target`, and returns both the accepted
/// server-side connection and a client-side connection bound to
/// `client_table`/`client_target` on the same socket.
pub async fn connect_pair<S, C>(
    server_table: Arc<RpcTable<S>>,
    server_target: Arc<S>,
    client_table: Arc<RpcTable<C>>,
    client_target: Arc<C>,
) -> (Arc<Connection>, Arc<Connection>)
where
    S: Send + Sync + 'static + ?Sized,
    C: Send + Sync + 'static + ?Sized,
{
    let listener = RpcTcpListener::bind("127.0.0.1:0", server_table).await.expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener has a local address");

    let accept = tokio::spawn(async move { listener.accept_one(|| server_target).await.expect("accept loopback connection") });

    let client = connect(&addr.to_string(), client_table, client_target).await.expect("connect to loopback listener");
    let server = accept.await.expect("accept task panicked");
    (server, client)
}

/// Convenience wrapper for the common case (server has no client-initiated
/// calls to make, so its table type doubles as a unit client handler).
pub async fn connect_calculator() -> (Arc<Connection>, Arc<Connection>, Arc<RpcTable<Calculator>>) {
    let table = calculator_table();
    let client_table: Arc<RpcTable<()>> = Arc::new(RpcTable::builder().build());
    let (server, client) = connect_pair(table.clone(), Arc::new(Calculator::default()), client_table, Arc::new(())).await;
    (server, client, table)
}

/// Server-side handler for the bidirectional scenario: dispatching
/// `doFunc1` reaches back into the calling connection to issue `func1`,
/// then records what the client eventually returns.
pub struct BidiServer {
    func1_rpcid: u8,
    last_func1_result: Mutex<Option<i32>>,
}

impl BidiServer {
    pub fn new(func1_rpcid: u8) -> Self {
        BidiServer { func1_rpcid, last_func1_result: Mutex::new(None) }
    }

    pub fn last_func1_result(&self) -> Option<i32> {
        *self.last_func1_result.lock().expect("bidi server mutex poisoned")
    }

    async fn do_func1(self: Arc<Self>, (v,): (i32,)) -> anyhow::Result<i32> {
        let conn = Connection::current().expect("dispatch runs with a current connection");
        let future = conn.call::<(i32,), i32>(self.func1_rpcid, &(v,))?;
        let result = future.wait_rpc().await.map_err(|e| anyhow::anyhow!(e.to_string()))?;
        *self.last_func1_result.lock().expect("bidi server mutex poisoned") = Some(result);
        Ok(result)
    }
}

pub fn bidi_server_table(func1_rpcid: u8) -> (Arc<RpcTable<BidiServer>>, Arc<BidiServer>) {
    let table = Arc::new(
        RpcTable::builder()
            .register("doFunc1", true, |t: Arc<BidiServer>, p| async move { t.do_func1(p).await })
            .build(),
    );
    (table, Arc::new(BidiServer::new(func1_rpcid)))
}

/// Client-side handler for the bidirectional scenario: `func1` itself
/// issues a further reverse call, `doFunc3`, before returning.
pub struct BidiClient {
    dofunc3_rpcid: u8,
    last_dofunc3_text: Mutex<Option<String>>,
    calls: AtomicU32,
}

impl BidiClient {
    pub fn new(dofunc3_rpcid: u8) -> Self {
        BidiClient { dofunc3_rpcid, last_dofunc3_text: Mutex::new(None), calls: AtomicU32::new(0) }
    }

    pub fn last_dofunc3_text(&self) -> Option<String> {
        self.last_dofunc3_text.lock().expect("bidi client mutex poisoned").clone()
    }

    async fn func1(self: Arc<Self>, (v,): (i32,)) -> anyhow::Result<i32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let conn = Connection::current().expect("dispatch runs with a current connection");
        let future = conn.call::<(String,), ()>(self.dofunc3_rpcid, &("Back to server".to_string(),))?;
        future.wait_rpc().await.map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(v + 1)
    }

    async fn do_func3(self: Arc<Self>, (text,): (String,)) -> anyhow::Result<()> {
        *self.last_dofunc3_text.lock().expect("bidi client mutex poisoned") = Some(text);
        Ok(())
    }
}

pub fn bidi_client_table() -> (Arc<RpcTable<BidiClient>>, Arc<BidiClient>) {
    // `doFunc3` is registered first so its rpcid (1) is known before the
    // table that references it (the server table needs func1's rpcid, and
    // this side needs doFunc3's) is built — both peers must agree on a
    // fixed method order per interface.
    let table = RpcTable::<BidiClient>::builder();
    let dofunc3_rpcid = 1;
    let table = table
        .register("doFunc3", false, |t: Arc<BidiClient>, p| async move { t.do_func3(p).await })
        .register("func1", true, |t: Arc<BidiClient>, p| async move { t.func1(p).await })
        .build();
    (Arc::new(table), Arc::new(BidiClient::new(dofunc3_rpcid)))
}
