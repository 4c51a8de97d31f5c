//! End-to-end lifecycle of a deal token against the simulated ledger:
//! 1. Merchant mints the deal
//! 2. Merchant hands the token to a customer
//! 3. Customer lists it on the secondary market
//! 4. A buyer pays the ask price
//! 5. Customer delivers the token to the buyer
//! 6. Buyer redeems on-ledger and gets an offline ticket

mod helpers;

use chrono::TimeDelta;
use deal_token::{
    DealRecord, ErrorKind, ListingStatus, TicketKey, Ticketing, mint, transfer,
};
use helpers::{FUNDED, connection, funded_wallet, lamports, pizza, token_balance};

#[tokio::test]
async fn full_deal_lifecycle() {
    let conn = connection();
    let ledger = conn.ledger().clone();
    let merchant = funded_wallet(&conn, FUNDED);
    let customer = funded_wallet(&conn, FUNDED);
    let buyer = funded_wallet(&conn, FUNDED);
    let marketplace = conn.config().marketplace_address.expect("marketplace");

    // ------------------------------------------------------------------
    // Mint
    // ------------------------------------------------------------------
    let minted = mint::mint(&conn, &merchant, pizza()).await;
    assert!(minted.success, "{:?}", minted.message);
    assert!(minted.explorer_ref.as_deref().is_some_and(|r| r.contains("cluster=devnet")));
    let token = minted.value.expect("identity");
    let mint_address = token.mint_address;
    assert_eq!(token.owner_address, merchant.address());
    assert_eq!(ledger.submission_count(), 2);
    assert_eq!(token_balance(&conn, &merchant.address(), &mint_address).await, 1);

    let state = mint::query(&conn, &mint_address)
        .await
        .into_result()
        .expect("mint state");
    assert!(state.is_single_edition());

    // ------------------------------------------------------------------
    // Merchant -> customer
    // ------------------------------------------------------------------
    let receipt = transfer::transfer(
        &conn,
        &merchant,
        &mint_address,
        &customer.address().to_string(),
    )
    .await
    .into_result()
    .expect("transfer");
    assert_eq!(receipt.from, merchant.address());
    assert_eq!(receipt.to, customer.address());
    assert_eq!(token_balance(&conn, &merchant.address(), &mint_address).await, 0);
    assert_eq!(token_balance(&conn, &customer.address(), &mint_address).await, 1);

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------
    let ask = deal_token::Amount::parse_sol("0.5").expect("price");
    let listing = transfer::list(&conn, &customer, &mint_address, ask)
        .await
        .into_result()
        .expect("list");
    assert_eq!(listing.status, ListingStatus::Listed);
    assert_eq!(listing.seller_address, customer.address());
    assert!(listing.transaction_ref.is_some());
    assert_eq!(
        lamports(&conn, &marketplace).await,
        conn.config().listing_fee_lamports
    );

    // ------------------------------------------------------------------
    // Purchase
    // ------------------------------------------------------------------
    let seller_before = lamports(&conn, &customer.address()).await;
    let sold = transfer::sell(&conn, &buyer, &listing)
        .await
        .into_result()
        .expect("sell");
    assert_eq!(sold.status, ListingStatus::Sold);
    assert_eq!(sold.buyer_address, Some(buyer.address()));
    assert_eq!(
        lamports(&conn, &customer.address()).await,
        seller_before + ask.lamports()
    );

    let again = transfer::sell(&conn, &buyer, &sold).await;
    assert_eq!(again.error_kind, Some(ErrorKind::InvalidInput));

    transfer::transfer(&conn, &customer, &mint_address, &buyer.address().to_string())
        .await
        .into_result()
        .expect("deliver");
    assert_eq!(token_balance(&conn, &buyer.address(), &mint_address).await, 1);

    // ------------------------------------------------------------------
    // Redemption
    // ------------------------------------------------------------------
    let redeemed = transfer::redeem(&conn, &buyer, &mint_address)
        .await
        .into_result()
        .expect("redeem");
    assert_eq!(redeemed.owner, buyer.address());
    assert_eq!(token_balance(&conn, &buyer.address(), &mint_address).await, 0);
    let state = mint::query(&conn, &mint_address)
        .await
        .into_result()
        .expect("mint state");
    assert_eq!(state.supply, 0);
    assert_eq!(state.mint_authority, None);

    let ticketing = Ticketing::new(TicketKey::generate(), TimeDelta::hours(24));
    let deal = DealRecord {
        deal_id: mint_address.to_string(),
        deal_title: token.metadata.title.clone(),
        merchant: token.metadata.merchant.clone(),
        discount_price: token.metadata.deal_price,
        expiry_date: chrono::Utc::now().date_naive() + TimeDelta::days(30),
        redemption_type: "QR".to_string(),
        nft_mint_address: Some(mint_address),
        transaction_signature: Some(redeemed.signature),
    };
    let ticket = ticketing.issue(&deal).into_result().expect("ticket");
    let document = ticket.to_json().expect("ticket json");
    let verified = ticketing
        .verify_json(&document)
        .into_result()
        .expect("verify");
    assert_eq!(verified.nft_mint_address, Some(mint_address));
    assert_eq!(verified.merchant, "Joe's");
}

#[tokio::test]
async fn listing_requires_marketplace_and_price() {
    let mut config = helpers::test_config();
    config.marketplace_address = None;
    let conn = deal_token::Connection::with_ledger(config, deal_token::SimulatedLedger::new());
    let seller = funded_wallet(&conn, FUNDED);
    let mint_address = deal_token::Keypair::generate().address();

    let result = transfer::list(&conn, &seller, &mint_address, deal_token::Amount::from_lamports(1)).await;
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidInput));

    let conn = connection();
    let seller = funded_wallet(&conn, FUNDED);
    let result = transfer::list(&conn, &seller, &mint_address, deal_token::Amount::ZERO).await;
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidInput));
    assert_eq!(conn.ledger().submission_count(), 0);
}

#[tokio::test]
async fn buyer_without_funds_is_stopped_before_signing() {
    let conn = connection();
    let seller = funded_wallet(&conn, FUNDED);
    let buyer = funded_wallet(&conn, 1_000_000);
    let minted = mint::mint(&conn, &seller, pizza())
        .await
        .into_result()
        .expect("mint");
    let listing = transfer::list(
        &conn,
        &seller,
        &minted.mint_address,
        deal_token::Amount::parse_sol("1").expect("price"),
    )
    .await
    .into_result()
    .expect("list");
    let before = conn.ledger().submission_count();

    let result = transfer::sell(&conn, &buyer, &listing).await;
    assert_eq!(result.error_kind, Some(ErrorKind::InsufficientBalance));
    assert_eq!(conn.ledger().submission_count(), before);
}
