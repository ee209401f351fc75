// (C) Copyright IBM Corp. 2024.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{env, error::Error, thread, time::Duration};

use dotenvy::dotenv;
use graphql_subscription_manager::SubscriptionManager;
use serde_json::json;

fn main() -> std::result::Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let url = env::var("WS_URL").expect("WS_URL should be set.");
    let token = env::var("TOKEN").expect("TOKEN should be set.");
    let query = env::var("QUERY").expect("QUERY should be set.");
    let user_agent = env::var("USER_AGENT").ok();

    let mut builder = SubscriptionManager::builder(&url).init_payload(json!({ "token": token }));
    if let Some(user_agent) = &user_agent {
        builder = builder.user_agent(user_agent);
    }
    let manager = builder.build()?;
    manager.start()?;

    print!("Waiting for the connection...");
    if !manager.wait_until_running(Duration::from_secs(30))? {
        println!(" FAILED ({:?})", manager.get_state()?);
        return Ok(());
    }
    println!(" DONE");

    match manager.subscribe(&query, |data| println!("Received: {data}"))? {
        Some(id) => println!("Subscribed with id {id}"),
        None => println!("Subscription is pending, it will start once connected"),
    }

    println!("Data is printed as it arrives for the next 60 seconds.");
    for _ in 0..12 {
        thread::sleep(Duration::from_secs(5));
        println!("Connection state: {:?}", manager.get_state()?);
    }

    manager.stop()?;
    Ok(())
}
